//! Core Kernel - Foundational types shared by the house-accounts crates
//!
//! - Money types with precise decimal arithmetic
//! - Strongly-typed identifiers for accounts, invoices and transactions
//! - Port error and health types shared by every storage adapter

pub mod money;
pub mod identifiers;
pub mod ports;

pub use money::{Money, Currency, MoneyError, Rate};
pub use identifiers::{AccountId, InvoiceId, TransactionId};
pub use ports::{
    PortError, DomainPort, AdapterConfig, AdapterType, AdapterHealth,
    HealthCheckResult, HealthCheckable,
};
