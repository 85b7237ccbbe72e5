//! Ledger Store Port
//!
//! The storage contract shared by every backend. Records live in three
//! collections (accounts, invoices with their line items, transactions).
//! Multi-record changes are expressed as data ([`Mutation`]) and resolved by
//! one pure function ([`stage`]), so adapters only load, lock and persist;
//! none of them re-encodes a business rule.
//!
//! # Adapters
//!
//! - **Relational** (`infra_db::PostgresLedgerStore`): one database
//!   transaction per [`LedgerStore::atomic_apply`] with row locks
//! - **Document** (`infra_db::DocumentLedgerStore`): versioned JSON documents
//!   with an optimistic compare-and-set commit
//! - **In-memory** ([`mock::InMemoryLedgerStore`]): for tests
//!
//! # Usage
//!
//! ```rust,ignore
//! let writes = store
//!     .atomic_apply(vec![
//!         Mutation::Insert(Record::Invoice(invoice.clone())),
//!         Mutation::AdjustBalance { account_id, delta: BalanceDelta::invoice_created(&invoice) },
//!     ])
//!     .await?;
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use core_kernel::{AccountId, DomainPort, HealthCheckable, InvoiceId, PortError, TransactionId};

use crate::account::Account;
use crate::invoice::{Invoice, InvoiceStatus};
use crate::rules::BalanceDelta;
use crate::transaction::Transaction;

/// The three ledger collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Accounts,
    Invoices,
    Transactions,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::Accounts,
        Collection::Invoices,
        Collection::Transactions,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Accounts => "accounts",
            Collection::Invoices => "invoices",
            Collection::Transactions => "transactions",
        }
    }

    fn entity(&self) -> &'static str {
        match self {
            Collection::Accounts => "Account",
            Collection::Invoices => "Invoice",
            Collection::Transactions => "Transaction",
        }
    }

    /// Listing order used by the read endpoints
    pub fn default_order(&self) -> OrderBy {
        match self {
            Collection::Accounts => OrderBy::Name,
            Collection::Invoices | Collection::Transactions => OrderBy::DateDesc,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity of one stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKey {
    Account(AccountId),
    Invoice(InvoiceId),
    Transaction(TransactionId),
}

impl RecordKey {
    pub fn collection(&self) -> Collection {
        match self {
            RecordKey::Account(_) => Collection::Accounts,
            RecordKey::Invoice(_) => Collection::Invoices,
            RecordKey::Transaction(_) => Collection::Transactions,
        }
    }

    pub fn uuid(&self) -> uuid::Uuid {
        match self {
            RecordKey::Account(id) => *id.as_uuid(),
            RecordKey::Invoice(id) => *id.as_uuid(),
            RecordKey::Transaction(id) => *id.as_uuid(),
        }
    }

    pub fn not_found(&self) -> PortError {
        PortError::not_found(self.collection().entity(), self)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Account(id) => write!(f, "{}", id),
            RecordKey::Invoice(id) => write!(f, "{}", id),
            RecordKey::Transaction(id) => write!(f, "{}", id),
        }
    }
}

impl From<AccountId> for RecordKey {
    fn from(id: AccountId) -> Self {
        RecordKey::Account(id)
    }
}

impl From<InvoiceId> for RecordKey {
    fn from(id: InvoiceId) -> Self {
        RecordKey::Invoice(id)
    }
}

impl From<TransactionId> for RecordKey {
    fn from(id: TransactionId) -> Self {
        RecordKey::Transaction(id)
    }
}

/// A stored record from any collection
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Account(Account),
    Invoice(Invoice),
    Transaction(Transaction),
}

impl Record {
    pub fn key(&self) -> RecordKey {
        match self {
            Record::Account(a) => RecordKey::Account(a.id),
            Record::Invoice(i) => RecordKey::Invoice(i.id),
            Record::Transaction(t) => RecordKey::Transaction(t.id),
        }
    }

    pub fn collection(&self) -> Collection {
        self.key().collection()
    }

    /// Encodes the record body as a JSON document
    pub fn to_document(&self) -> Result<serde_json::Value, PortError> {
        let encoded = match self {
            Record::Account(a) => serde_json::to_value(a),
            Record::Invoice(i) => serde_json::to_value(i),
            Record::Transaction(t) => serde_json::to_value(t),
        };
        encoded.map_err(|e| PortError::Serialization {
            message: format!("encoding {}: {}", self.key(), e),
        })
    }

    /// Decodes a JSON document from `collection`
    pub fn from_document(collection: Collection, document: serde_json::Value) -> Result<Self, PortError> {
        let decoded = match collection {
            Collection::Accounts => serde_json::from_value(document).map(Record::Account),
            Collection::Invoices => serde_json::from_value(document).map(Record::Invoice),
            Collection::Transactions => serde_json::from_value(document).map(Record::Transaction),
        };
        decoded.map_err(|e| PortError::Serialization {
            message: format!("decoding {} document: {}", collection.entity(), e),
        })
    }

    pub fn into_account(self) -> Result<Account, PortError> {
        match self {
            Record::Account(a) => Ok(a),
            other => Err(mismatch("Account", &other)),
        }
    }

    pub fn into_invoice(self) -> Result<Invoice, PortError> {
        match self {
            Record::Invoice(i) => Ok(i),
            other => Err(mismatch("Invoice", &other)),
        }
    }

    pub fn into_transaction(self) -> Result<Transaction, PortError> {
        match self {
            Record::Transaction(t) => Ok(t),
            other => Err(mismatch("Transaction", &other)),
        }
    }

    fn sort_date(&self) -> NaiveDate {
        match self {
            Record::Account(a) => a.created_at.date_naive(),
            Record::Invoice(i) => i.date,
            Record::Transaction(t) => t.date,
        }
    }

    fn sort_name(&self) -> Option<String> {
        match self {
            Record::Account(a) => Some(a.name.to_lowercase()),
            _ => None,
        }
    }
}

fn mismatch(expected: &str, found: &Record) -> PortError {
    PortError::internal(format!("expected {} record, found {}", expected, found.key()))
}

/// Listing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    /// Account name ascending, case-insensitive
    Name,
    DateAsc,
    DateDesc,
}

impl OrderBy {
    /// Total order over records; ties fall back to the record key
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        match self {
            OrderBy::Name => a
                .sort_name()
                .cmp(&b.sort_name())
                .then_with(|| a.key().cmp(&b.key())),
            OrderBy::DateAsc => a
                .sort_date()
                .cmp(&b.sort_date())
                .then_with(|| a.key().cmp(&b.key())),
            OrderBy::DateDesc => OrderBy::DateAsc.compare(b, a),
        }
    }

    pub fn sort(&self, records: &mut [Record]) {
        records.sort_by(|a, b| self.compare(a, b));
    }
}

/// One change inside an atomic apply
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Create a record; fails with `Duplicate` if it already exists
    Insert(Record),
    /// Full upsert
    Put(Record),
    /// Apply a balance delta to an existing account
    AdjustBalance {
        account_id: AccountId,
        delta: BalanceDelta,
    },
    /// Move an invoice between statuses; fails with `PreconditionFailed`
    /// if the stored status is not `from`
    TransitionInvoice {
        invoice_id: InvoiceId,
        from: InvoiceStatus,
        to: InvoiceStatus,
    },
    MarkEmailSent {
        invoice_id: InvoiceId,
    },
}

impl Mutation {
    pub fn key(&self) -> RecordKey {
        match self {
            Mutation::Insert(record) | Mutation::Put(record) => record.key(),
            Mutation::AdjustBalance { account_id, .. } => RecordKey::Account(*account_id),
            Mutation::TransitionInvoice { invoice_id, .. } => RecordKey::Invoice(*invoice_id),
            Mutation::MarkEmailSent { invoice_id } => RecordKey::Invoice(*invoice_id),
        }
    }

    /// Computes the next state of the record this mutation targets
    pub fn apply(&self, current: Option<Record>) -> Result<Record, PortError> {
        match self {
            Mutation::Insert(record) => match current {
                Some(existing) => Err(PortError::duplicate(
                    existing.collection().entity(),
                    existing.key(),
                )),
                None => Ok(record.clone()),
            },
            Mutation::Put(record) => Ok(record.clone()),
            Mutation::AdjustBalance { account_id, delta } => {
                let mut account = current
                    .ok_or_else(|| RecordKey::Account(*account_id).not_found())?
                    .into_account()?;
                account.current_balance = delta
                    .apply(account.current_balance)
                    .map_err(|e| PortError::validation(e.to_string()))?;
                Ok(Record::Account(account))
            }
            Mutation::TransitionInvoice { invoice_id, from, to } => {
                let mut invoice = current
                    .ok_or_else(|| RecordKey::Invoice(*invoice_id).not_found())?
                    .into_invoice()?;
                if invoice.status != *from {
                    return Err(PortError::precondition(format!(
                        "invoice {} is {}, expected {}",
                        invoice_id, invoice.status, from
                    )));
                }
                invoice.status = *to;
                Ok(Record::Invoice(invoice))
            }
            Mutation::MarkEmailSent { invoice_id } => {
                let mut invoice = current
                    .ok_or_else(|| RecordKey::Invoice(*invoice_id).not_found())?
                    .into_invoice()?;
                invoice.email_sent = true;
                Ok(Record::Invoice(invoice))
            }
        }
    }

    fn replaces_record(&self) -> bool {
        matches!(self, Mutation::Insert(_) | Mutation::Put(_))
    }
}

/// Final state of one record after a batch of mutations
#[derive(Debug, Clone, PartialEq)]
pub struct StagedWrite {
    pub record: Record,
    /// The record did not exist before the batch
    pub created: bool,
    /// Child rows (invoice items) must be rewritten
    pub replace_children: bool,
}

/// Distinct keys touched by a batch, in lock order
pub fn touched_keys(mutations: &[Mutation]) -> Vec<RecordKey> {
    mutations
        .iter()
        .map(Mutation::key)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Resolves a batch against the records loaded for [`touched_keys`]
///
/// Mutations apply in order; a later mutation on the same key sees the
/// result of the earlier one. Any error aborts the whole batch.
pub fn stage(
    mutations: &[Mutation],
    mut loaded: HashMap<RecordKey, Option<Record>>,
) -> Result<Vec<StagedWrite>, PortError> {
    let mut order: Vec<RecordKey> = Vec::new();
    let mut created: HashSet<RecordKey> = HashSet::new();
    let mut replaced: HashSet<RecordKey> = HashSet::new();

    for mutation in mutations {
        let key = mutation.key();
        let current = loaded.get(&key).cloned().flatten();
        if current.is_none() {
            created.insert(key);
        }
        if mutation.replaces_record() {
            replaced.insert(key);
        }

        let next = mutation.apply(current)?;
        if next.key() != key {
            return Err(PortError::internal(format!(
                "mutation on {} produced record {}",
                key,
                next.key()
            )));
        }
        loaded.insert(key, Some(next));
        if !order.contains(&key) {
            order.push(key);
        }
    }

    order
        .into_iter()
        .map(|key| {
            let record = loaded
                .remove(&key)
                .flatten()
                .ok_or_else(|| PortError::internal(format!("staged record {} vanished", key)))?;
            Ok(StagedWrite {
                record,
                created: created.contains(&key),
                replace_children: replaced.contains(&key),
            })
        })
        .collect()
}

/// Storage port for the ledger
#[async_trait]
pub trait LedgerStore: DomainPort + HealthCheckable {
    /// Fetches one record, `NotFound` if absent
    async fn get(&self, key: RecordKey) -> Result<Record, PortError>;

    /// Lists a collection; `None` leaves the order to the backend
    async fn list(&self, collection: Collection, order: Option<OrderBy>) -> Result<Vec<Record>, PortError>;

    /// Full upsert outside any batch
    async fn put(&self, record: Record) -> Result<(), PortError>;

    /// Applies every mutation or none of them
    ///
    /// Concurrent readers observe either the pre-state or the full
    /// post-state. Returns the post-state of each touched record.
    async fn atomic_apply(&self, mutations: Vec<Mutation>) -> Result<Vec<StagedWrite>, PortError>;

    /// Flushes and releases the backend
    async fn close(&self) -> Result<(), PortError>;
}

/// Typed convenience reads over any [`LedgerStore`]
#[async_trait]
pub trait LedgerStoreExt: LedgerStore {
    async fn get_account(&self, id: AccountId) -> Result<Account, PortError> {
        self.get(RecordKey::Account(id)).await?.into_account()
    }

    async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, PortError> {
        self.get(RecordKey::Invoice(id)).await?.into_invoice()
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, PortError> {
        self.get(RecordKey::Transaction(id)).await?.into_transaction()
    }

    /// Accounts by name
    async fn list_accounts(&self) -> Result<Vec<Account>, PortError> {
        self.list(Collection::Accounts, Some(OrderBy::Name))
            .await?
            .into_iter()
            .map(Record::into_account)
            .collect()
    }

    /// Invoices, newest first
    async fn list_invoices(&self) -> Result<Vec<Invoice>, PortError> {
        self.list(Collection::Invoices, Some(OrderBy::DateDesc))
            .await?
            .into_iter()
            .map(Record::into_invoice)
            .collect()
    }

    /// Transactions, newest first
    async fn list_transactions(&self) -> Result<Vec<Transaction>, PortError> {
        self.list(Collection::Transactions, Some(OrderBy::DateDesc))
            .await?
            .into_iter()
            .map(Record::into_transaction)
            .collect()
    }
}

// Blanket implementation for all LedgerStore implementors
impl<T: LedgerStore + ?Sized> LedgerStoreExt for T {}

/// In-memory implementation of LedgerStore for testing
///
/// Every batch is staged and committed under one write lock, so it is
/// trivially atomic. Failure injection lets tests prove that a batch which
/// errors after staging leaves nothing behind.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use core_kernel::{AdapterHealth, HealthCheckResult};
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
    use std::sync::Arc;
    use tokio::sync::RwLock;

    #[derive(Debug, Default)]
    pub struct InMemoryLedgerStore {
        records: Arc<RwLock<HashMap<RecordKey, Record>>>,
        fail_next_apply: AtomicBool,
        unavailable: AtomicBool,
        commits: AtomicU64,
    }

    impl InMemoryLedgerStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates the store
        pub async fn with_records(records: Vec<Record>) -> Self {
            let store = Self::new();
            {
                let mut map = store.records.write().await;
                for record in records {
                    map.insert(record.key(), record);
                }
            }
            store
        }

        /// The next `atomic_apply` stages its batch, then fails before commit
        pub fn fail_next_apply(&self) {
            self.fail_next_apply.store(true, AtomicOrdering::SeqCst);
        }

        /// Simulates an unreachable backend for every operation
        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
        }

        /// Number of committed batches
        pub fn commit_count(&self) -> u64 {
            self.commits.load(AtomicOrdering::SeqCst)
        }

        fn ensure_available(&self) -> Result<(), PortError> {
            if self.unavailable.load(AtomicOrdering::SeqCst) {
                return Err(PortError::ServiceUnavailable {
                    service: "in-memory ledger".to_string(),
                });
            }
            Ok(())
        }
    }

    impl DomainPort for InMemoryLedgerStore {}

    #[async_trait]
    impl HealthCheckable for InMemoryLedgerStore {
        async fn health_check(&self) -> HealthCheckResult {
            if self.unavailable.load(AtomicOrdering::SeqCst) {
                return HealthCheckResult::unhealthy("mock-ledger-store", 0, "simulated outage");
            }
            HealthCheckResult {
                adapter_id: "mock-ledger-store".to_string(),
                status: AdapterHealth::Healthy,
                latency_ms: 0,
                message: Some("Mock adapter always healthy".to_string()),
                checked_at: chrono::Utc::now(),
            }
        }
    }

    #[async_trait]
    impl LedgerStore for InMemoryLedgerStore {
        async fn get(&self, key: RecordKey) -> Result<Record, PortError> {
            self.ensure_available()?;
            self.records
                .read()
                .await
                .get(&key)
                .cloned()
                .ok_or_else(|| key.not_found())
        }

        async fn list(&self, collection: Collection, order: Option<OrderBy>) -> Result<Vec<Record>, PortError> {
            self.ensure_available()?;
            let mut records: Vec<Record> = self
                .records
                .read()
                .await
                .values()
                .filter(|r| r.collection() == collection)
                .cloned()
                .collect();
            if let Some(order) = order {
                order.sort(&mut records);
            }
            Ok(records)
        }

        async fn put(&self, record: Record) -> Result<(), PortError> {
            self.ensure_available()?;
            self.records.write().await.insert(record.key(), record);
            Ok(())
        }

        async fn atomic_apply(&self, mutations: Vec<Mutation>) -> Result<Vec<StagedWrite>, PortError> {
            self.ensure_available()?;
            let mut records = self.records.write().await;

            let loaded = touched_keys(&mutations)
                .into_iter()
                .map(|key| (key, records.get(&key).cloned()))
                .collect();
            let writes = stage(&mutations, loaded)?;

            if self.fail_next_apply.swap(false, AtomicOrdering::SeqCst) {
                return Err(PortError::ServiceUnavailable {
                    service: "in-memory ledger (injected failure)".to_string(),
                });
            }

            for write in &writes {
                records.insert(write.record.key(), write.record.clone());
            }
            self.commits.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(writes)
        }

        async fn close(&self) -> Result<(), PortError> {
            Ok(())
        }
    }
}
