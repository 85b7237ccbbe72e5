//! Billing Domain - House-account ledger
//!
//! Customer credit accounts, charge and payment transactions, and invoices
//! for a fuel and convenience retailer. The one shared mutable counter is
//! `Account::current_balance`; every change to it goes through the
//! [`LedgerService`] and lands in the store as a single atomic batch
//! together with the record that caused it.
//!
//! # Balance rules
//!
//! - Invoice created with amount `A`: balance `+A`
//! - Invoice paid: balance `-A`, floored at zero, applied at most once
//! - FUEL / STORE transaction `A`: balance `+A`
//! - PAYMENT transaction `A`: balance `-A`
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{LedgerService, NewAccount, BillingSettings};
//!
//! let service = LedgerService::new(store, BillingSettings::default());
//! let account = service.create_account(NewAccount::new("Acme Hauling", "ap@acme.test")).await?;
//!
//! let invoice = service
//!     .draft_invoice(account.id, today)
//!     .item(LineItem::new("Diesel", dec!(40), price))
//!     .build()?;
//! let invoice = service.create_invoice(invoice).await?;
//! service.mark_invoice_paid(invoice.id).await?;
//! ```

pub mod account;
pub mod error;
pub mod invoice;
pub mod lifecycle;
pub mod notification;
pub mod receipt;
pub mod rules;
pub mod service;
pub mod settings;
pub mod store;
pub mod transaction;

pub use account::{Account, CreditUtilization, NewAccount};
pub use error::{BillingError, ErrorKind};
pub use invoice::{Invoice, InvoiceDraft, InvoiceStatus, InvoiceTotals, LineItem, NewInvoice};
pub use lifecycle::{AgingBuckets, DashboardStats, MonthlyRevenue, OverdueReport};
pub use notification::{DispatchError, NotificationDispatch, OutboundEmail};
pub use receipt::{ScannedItem, ScannedReceipt};
pub use rules::BalanceDelta;
pub use service::{LedgerService, PaidInvoice};
pub use settings::BillingSettings;
pub use store::{Collection, LedgerStore, LedgerStoreExt, Mutation, OrderBy, Record, RecordKey, StagedWrite};
pub use transaction::{NewTransaction, Transaction, TransactionType};
