//! PostgreSQL Ledger Adapter
//!
//! Relational implementation of [`LedgerStore`]. Each `atomic_apply` runs in
//! one database transaction:
//!
//! 1. lock every touched row with `SELECT ... FOR UPDATE`, in key order
//! 2. resolve the batch with [`stage`]
//! 3. write the staged records back
//! 4. commit, or roll back explicitly on any error
//!
//! Locking in a fixed key order (accounts before invoices before
//! transactions) keeps two batches on the same account from deadlocking.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, DatabaseConfig, PostgresLedgerStore};
//!
//! let pool = create_pool(DatabaseConfig::new(url)).await?;
//! let store: Arc<dyn LedgerStore> = Arc::new(PostgresLedgerStore::new(pool));
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use core_kernel::{
    AccountId, AdapterConfig, AdapterType, Currency, DomainPort, HealthCheckResult, HealthCheckable, InvoiceId,
    Money, PortError, TransactionId,
};
use domain_billing::store::{stage, touched_keys};
use domain_billing::{
    Account, Collection, Invoice, InvoiceStatus, LedgerStore, LineItem, Mutation, OrderBy, Record, RecordKey,
    StagedWrite, Transaction, TransactionType,
};

use crate::error::port_error;

const ACCOUNT_COLUMNS: &str =
    "id, name, email, phone, credit_limit, current_balance, currency, created_at";
const INVOICE_COLUMNS: &str = "id, account_id, date, due_date, amount, currency, status, email_sent";
const TRANSACTION_COLUMNS: &str = "id, account_id, date, type, amount, currency, description, items";

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    name: String,
    email: String,
    phone: Option<String>,
    credit_limit: Decimal,
    current_balance: Decimal,
    currency: String,
    created_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_account(self) -> Result<Account, PortError> {
        let currency = parse_currency(&self.currency)?;
        Ok(Account {
            id: AccountId::from_uuid(self.id),
            name: self.name,
            email: self.email,
            phone: self.phone,
            credit_limit: Money::new(self.credit_limit, currency),
            current_balance: Money::new(self.current_balance, currency),
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    account_id: Uuid,
    date: NaiveDate,
    due_date: NaiveDate,
    amount: Decimal,
    currency: String,
    status: String,
    email_sent: bool,
}

impl InvoiceRow {
    fn into_invoice(self, items: Vec<ItemRow>) -> Result<Invoice, PortError> {
        let currency = parse_currency(&self.currency)?;
        let status: InvoiceStatus = self
            .status
            .parse()
            .map_err(|_| decode_error("invoice status", &self.status))?;
        Ok(Invoice {
            id: InvoiceId::from_uuid(self.id),
            account_id: AccountId::from_uuid(self.account_id),
            date: self.date,
            due_date: self.due_date,
            amount: Money::new(self.amount, currency),
            status,
            items: items
                .into_iter()
                .map(|item| LineItem::new(item.description, item.quantity, Money::new(item.price, currency)))
                .collect(),
            email_sent: self.email_sent,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    invoice_id: Uuid,
    description: String,
    quantity: Decimal,
    price: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    account_id: Uuid,
    date: NaiveDate,
    #[sqlx(rename = "type")]
    kind: String,
    amount: Decimal,
    currency: String,
    description: Option<String>,
    items: Json<Vec<LineItem>>,
}

impl TransactionRow {
    fn into_transaction(self) -> Result<Transaction, PortError> {
        let currency = parse_currency(&self.currency)?;
        let transaction_type: TransactionType = self
            .kind
            .parse()
            .map_err(|_| decode_error("transaction type", &self.kind))?;
        Ok(Transaction {
            id: TransactionId::from_uuid(self.id),
            account_id: AccountId::from_uuid(self.account_id),
            date: self.date,
            transaction_type,
            amount: Money::new(self.amount, currency),
            description: self.description,
            items: self.items.0,
        })
    }
}

fn parse_currency(raw: &str) -> Result<Currency, PortError> {
    raw.parse().map_err(|_| decode_error("currency", raw))
}

fn decode_error(what: &str, raw: &str) -> PortError {
    PortError::Serialization {
        message: format!("stored {} '{}' is not recognised", what, raw),
    }
}

/// PostgreSQL-backed implementation of the LedgerStore trait
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
    config: AdapterConfig,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            config: AdapterConfig::new("postgres-ledger-store", AdapterType::Relational),
        }
    }

    /// Overrides the adapter configuration (timeouts)
    pub fn with_config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn apply_in_transaction(
        conn: &mut PgConnection,
        mutations: &[Mutation],
    ) -> Result<Vec<StagedWrite>, PortError> {
        let mut loaded = HashMap::new();
        for key in touched_keys(mutations) {
            let current = fetch_record(conn, key, true).await?;
            loaded.insert(key, current);
        }

        let writes = stage(mutations, loaded)?;
        for write in &writes {
            write_record(conn, write).await?;
        }
        Ok(writes)
    }
}

impl DomainPort for PostgresLedgerStore {}

#[async_trait]
impl HealthCheckable for PostgresLedgerStore {
    async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let result = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult::healthy(&self.config.adapter_id, latency_ms),
            Err(e) => HealthCheckResult::unhealthy(
                &self.config.adapter_id,
                latency_ms,
                format!("Database error: {}", e),
            ),
        }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    #[instrument(skip(self), fields(key = %key))]
    async fn get(&self, key: RecordKey) -> Result<Record, PortError> {
        let mut conn = self.pool.acquire().await.map_err(port_error)?;
        fetch_record(&mut conn, key, false)
            .await?
            .ok_or_else(|| key.not_found())
    }

    #[instrument(skip(self), fields(collection = %collection))]
    async fn list(&self, collection: Collection, order: Option<OrderBy>) -> Result<Vec<Record>, PortError> {
        let mut records = match collection {
            Collection::Accounts => {
                let sql = format!("SELECT {} FROM accounts", ACCOUNT_COLUMNS);
                sqlx::query_as::<_, AccountRow>(&sql)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(port_error)?
                    .into_iter()
                    .map(|row| row.into_account().map(Record::Account))
                    .collect::<Result<Vec<_>, _>>()?
            }
            Collection::Invoices => {
                let sql = format!("SELECT {} FROM invoices", INVOICE_COLUMNS);
                let rows = sqlx::query_as::<_, InvoiceRow>(&sql)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(port_error)?;
                let mut items = group_items(
                    sqlx::query_as::<_, ItemRow>(
                        "SELECT invoice_id, description, quantity, price FROM invoice_items ORDER BY invoice_id, position",
                    )
                    .fetch_all(&self.pool)
                    .await
                    .map_err(port_error)?,
                );
                rows.into_iter()
                    .map(|row| {
                        let lines = items.remove(&row.id).unwrap_or_default();
                        row.into_invoice(lines).map(Record::Invoice)
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
            Collection::Transactions => {
                let sql = format!("SELECT {} FROM transactions", TRANSACTION_COLUMNS);
                sqlx::query_as::<_, TransactionRow>(&sql)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(port_error)?
                    .into_iter()
                    .map(|row| row.into_transaction().map(Record::Transaction))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        // Ordering is shared with the other backends rather than left to collation
        if let Some(order) = order {
            order.sort(&mut records);
        }
        debug!(count = records.len(), "Listed records");
        Ok(records)
    }

    #[instrument(skip(self, record), fields(key = %record.key()))]
    async fn put(&self, record: Record) -> Result<(), PortError> {
        let mut tx = self.pool.begin().await.map_err(port_error)?;
        let write = StagedWrite {
            record,
            created: false,
            replace_children: true,
        };
        if let Err(e) = write_record(&mut tx, &write).await {
            tx.rollback().await.map_err(port_error)?;
            return Err(e);
        }
        tx.commit().await.map_err(port_error)
    }

    #[instrument(skip(self, mutations), fields(batch = mutations.len()))]
    async fn atomic_apply(&self, mutations: Vec<Mutation>) -> Result<Vec<StagedWrite>, PortError> {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let run = async {
            let mut tx = self.pool.begin().await.map_err(port_error)?;
            match Self::apply_in_transaction(&mut tx, &mutations).await {
                Ok(writes) => {
                    tx.commit().await.map_err(port_error)?;
                    debug!(records = writes.len(), "Batch committed");
                    Ok(writes)
                }
                Err(e) => {
                    debug!(error = %e, "Rolling back batch");
                    tx.rollback().await.map_err(port_error)?;
                    Err(e)
                }
            }
        };

        match tokio::time::timeout(timeout, run).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = self.config.timeout_ms, "Batch timed out");
                Err(PortError::Timeout {
                    operation: "atomic_apply".to_string(),
                    duration_ms: self.config.timeout_ms,
                })
            }
        }
    }

    async fn close(&self) -> Result<(), PortError> {
        self.pool.close().await;
        Ok(())
    }
}

fn group_items(rows: Vec<ItemRow>) -> HashMap<Uuid, Vec<ItemRow>> {
    let mut grouped: HashMap<Uuid, Vec<ItemRow>> = HashMap::new();
    for row in rows {
        grouped.entry(row.invoice_id).or_default().push(row);
    }
    grouped
}

/// Loads one record, optionally taking a row lock
async fn fetch_record(conn: &mut PgConnection, key: RecordKey, lock: bool) -> Result<Option<Record>, PortError> {
    let suffix = if lock { " FOR UPDATE" } else { "" };
    let id = key.uuid();

    match key {
        RecordKey::Account(_) => {
            let sql = format!("SELECT {} FROM accounts WHERE id = $1{}", ACCOUNT_COLUMNS, suffix);
            sqlx::query_as::<_, AccountRow>(&sql)
                .bind(id)
                .fetch_optional(&mut *conn)
                .await
                .map_err(port_error)?
                .map(|row| row.into_account().map(Record::Account))
                .transpose()
        }
        RecordKey::Invoice(_) => {
            let sql = format!("SELECT {} FROM invoices WHERE id = $1{}", INVOICE_COLUMNS, suffix);
            let Some(row) = sqlx::query_as::<_, InvoiceRow>(&sql)
                .bind(id)
                .fetch_optional(&mut *conn)
                .await
                .map_err(port_error)?
            else {
                return Ok(None);
            };
            let items = sqlx::query_as::<_, ItemRow>(
                "SELECT invoice_id, description, quantity, price FROM invoice_items WHERE invoice_id = $1 ORDER BY position",
            )
            .bind(id)
            .fetch_all(&mut *conn)
            .await
            .map_err(port_error)?;
            row.into_invoice(items).map(|inv| Some(Record::Invoice(inv)))
        }
        RecordKey::Transaction(_) => {
            let sql = format!("SELECT {} FROM transactions WHERE id = $1{}", TRANSACTION_COLUMNS, suffix);
            sqlx::query_as::<_, TransactionRow>(&sql)
                .bind(id)
                .fetch_optional(&mut *conn)
                .await
                .map_err(port_error)?
                .map(|row| row.into_transaction().map(Record::Transaction))
                .transpose()
        }
    }
}

/// Persists a staged record: plain INSERT when created, upsert otherwise
async fn write_record(conn: &mut PgConnection, write: &StagedWrite) -> Result<(), PortError> {
    match &write.record {
        Record::Account(account) => {
            let sql = if write.created {
                "INSERT INTO accounts (id, name, email, phone, credit_limit, current_balance, currency, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
            } else {
                "INSERT INTO accounts (id, name, email, phone, credit_limit, current_balance, currency, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 ON CONFLICT (id) DO UPDATE SET
                    name = EXCLUDED.name,
                    email = EXCLUDED.email,
                    phone = EXCLUDED.phone,
                    credit_limit = EXCLUDED.credit_limit,
                    current_balance = EXCLUDED.current_balance,
                    currency = EXCLUDED.currency"
            };
            sqlx::query(sql)
                .bind(account.id.as_uuid())
                .bind(&account.name)
                .bind(&account.email)
                .bind(&account.phone)
                .bind(account.credit_limit.amount())
                .bind(account.current_balance.amount())
                .bind(account.currency().code())
                .bind(account.created_at)
                .execute(&mut *conn)
                .await
                .map_err(port_error)?;
        }
        Record::Invoice(invoice) => {
            let sql = if write.created {
                "INSERT INTO invoices (id, account_id, date, due_date, amount, currency, status, email_sent)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
            } else {
                "INSERT INTO invoices (id, account_id, date, due_date, amount, currency, status, email_sent)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 ON CONFLICT (id) DO UPDATE SET
                    account_id = EXCLUDED.account_id,
                    date = EXCLUDED.date,
                    due_date = EXCLUDED.due_date,
                    amount = EXCLUDED.amount,
                    currency = EXCLUDED.currency,
                    status = EXCLUDED.status,
                    email_sent = EXCLUDED.email_sent"
            };
            sqlx::query(sql)
                .bind(invoice.id.as_uuid())
                .bind(invoice.account_id.as_uuid())
                .bind(invoice.date)
                .bind(invoice.due_date)
                .bind(invoice.amount.amount())
                .bind(invoice.amount.currency().code())
                .bind(invoice.status.as_str())
                .bind(invoice.email_sent)
                .execute(&mut *conn)
                .await
                .map_err(port_error)?;

            if write.replace_children {
                replace_items(conn, invoice).await?;
            }
        }
        Record::Transaction(transaction) => {
            let sql = if write.created {
                "INSERT INTO transactions (id, account_id, date, type, amount, currency, description, items)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
            } else {
                "INSERT INTO transactions (id, account_id, date, type, amount, currency, description, items)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 ON CONFLICT (id) DO UPDATE SET
                    account_id = EXCLUDED.account_id,
                    date = EXCLUDED.date,
                    type = EXCLUDED.type,
                    amount = EXCLUDED.amount,
                    currency = EXCLUDED.currency,
                    description = EXCLUDED.description,
                    items = EXCLUDED.items"
            };
            sqlx::query(sql)
                .bind(transaction.id.as_uuid())
                .bind(transaction.account_id.as_uuid())
                .bind(transaction.date)
                .bind(transaction.transaction_type.as_str())
                .bind(transaction.amount.amount())
                .bind(transaction.amount.currency().code())
                .bind(&transaction.description)
                .bind(Json(&transaction.items))
                .execute(&mut *conn)
                .await
                .map_err(port_error)?;
        }
    }
    Ok(())
}

async fn replace_items(conn: &mut PgConnection, invoice: &Invoice) -> Result<(), PortError> {
    sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
        .bind(invoice.id.as_uuid())
        .execute(&mut *conn)
        .await
        .map_err(port_error)?;

    for (position, item) in invoice.items.iter().enumerate() {
        sqlx::query(
            "INSERT INTO invoice_items (invoice_id, position, description, quantity, price)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(invoice.id.as_uuid())
        .bind(position as i32)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.price.amount())
        .execute(&mut *conn)
        .await
        .map_err(port_error)?;
    }
    Ok(())
}
