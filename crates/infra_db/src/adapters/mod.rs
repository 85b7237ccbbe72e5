//! Ledger Store Adapters
//!
//! Implementations of the `domain_billing::LedgerStore` port.
//!
//! - [`PostgresLedgerStore`]: relational, one database transaction per batch
//! - [`DocumentLedgerStore`]: versioned JSON documents, optimistic commits
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresLedgerStore;
//! use domain_billing::LedgerStore;
//!
//! let store: Arc<dyn LedgerStore> = Arc::new(PostgresLedgerStore::new(pool));
//! let service = LedgerService::new(store, settings);
//! ```

pub mod document;
pub mod postgres;

pub use document::DocumentLedgerStore;
pub use postgres::PostgresLedgerStore;
