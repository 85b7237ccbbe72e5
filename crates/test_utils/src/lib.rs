//! Test Utilities Crate
//!
//! Shared test infrastructure for the house-account ledger.
//!
//! # Modules
//!
//! - `fixtures`: Fixed test data (money, dates, ids, receipts, settings)
//! - `builders`: Builders for accounts, invoices and transactions
//! - `harness`: Ledger services wired to test stores
//! - `database`: PostgreSQL testcontainer management
//! - `assertions`: Assertion helpers for ledger types
//! - `generators`: Property-based test data generators

pub mod assertions;
pub mod builders;
pub mod database;
pub mod fixtures;
pub mod generators;
pub mod harness;

pub use assertions::*;
pub use builders::*;
pub use database::*;
pub use fixtures::*;
pub use generators::*;
pub use harness::*;
