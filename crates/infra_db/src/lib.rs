//! Infrastructure Database Layer
//!
//! Storage backends for the house-account ledger.
//!
//! # Backends
//!
//! - **PostgreSQL** via SQLx: row locks and one transaction per atomic batch
//! - **Document**: versioned JSON documents with compare-and-set commits and
//!   an optional snapshot file
//!
//! Both implement `domain_billing::LedgerStore`, so the ledger service never
//! knows which one it is talking to.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresLedgerStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/house_accounts")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresLedgerStore::new(pool);
//! ```

pub mod adapters;
pub mod error;
pub mod pool;

pub use adapters::{DocumentLedgerStore, PostgresLedgerStore};
pub use error::{port_error, DatabaseError};
pub use pool::{create_pool, run_migrations, DatabaseConfig, DatabasePool, LEDGER_SCHEMA};
