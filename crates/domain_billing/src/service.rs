//! Ledger service
//!
//! Orchestrates the store so that every balance-mutating operation commits
//! its record change and its balance delta as one atomic batch. The balance
//! is never read and written back outside [`LedgerStore::atomic_apply`].

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use core_kernel::{AccountId, HealthCheckResult, InvoiceId, Money, PortError};

use crate::account::{Account, CreditUtilization, NewAccount};
use crate::error::BillingError;
use crate::invoice::{Invoice, InvoiceDraft, InvoiceStatus, NewInvoice};
use crate::lifecycle::{self, DashboardStats, OverdueReport};
use crate::notification::NotificationDispatch;
use crate::receipt::ScannedReceipt;
use crate::rules::BalanceDelta;
use crate::settings::BillingSettings;
use crate::store::{LedgerStore, LedgerStoreExt, Mutation, Record, StagedWrite};
use crate::transaction::{NewTransaction, Transaction};

/// Result of a pay request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaidInvoice {
    pub invoice: Invoice,
    /// False when the invoice was already paid and nothing changed
    pub newly_paid: bool,
}

/// Entry point for all ledger reads and writes
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    settings: BillingSettings,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>, settings: BillingSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &BillingSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Starts an invoice priced with this station's tax rate, terms and currency
    pub fn draft_invoice(&self, account_id: AccountId, date: NaiveDate) -> InvoiceDraft {
        InvoiceDraft::new(account_id, date)
            .tax_rate(self.settings.tax())
            .payment_terms_days(self.settings.payment_terms_days)
            .currency(self.settings.currency)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Opens an account with a zero balance
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_account(&self, request: NewAccount) -> Result<Account, BillingError> {
        request.validate()?;
        if let Some(limit) = &request.credit_limit {
            self.ensure_currency(limit)?;
        }

        let account = request.into_account(self.settings.currency, Utc::now());
        self.store
            .atomic_apply(vec![Mutation::Insert(Record::Account(account.clone()))])
            .await?;

        info!(account_id = %account.id, "Account created");
        Ok(account)
    }

    /// Stores an invoice and charges its amount to the account in one batch
    #[instrument(skip(self, request), fields(account_id = %request.account_id, amount = %request.amount))]
    pub async fn create_invoice(&self, request: NewInvoice) -> Result<Invoice, BillingError> {
        request.validate()?;
        self.ensure_currency(&request.amount)?;
        self.require_account(request.account_id).await?;

        let invoice = request.into_invoice();
        let delta = BalanceDelta::invoice_created(&invoice);
        self.store
            .atomic_apply(vec![
                Mutation::Insert(Record::Invoice(invoice.clone())),
                Mutation::AdjustBalance {
                    account_id: invoice.account_id,
                    delta,
                },
            ])
            .await
            .map_err(|e| reference_on_missing_account(e, invoice.account_id))?;

        info!(invoice_id = %invoice.id, delta = %delta.change, "Invoice created");
        Ok(invoice)
    }

    /// Marks an invoice paid and credits the account, at most once
    ///
    /// Paying an already paid invoice succeeds without touching the balance.
    /// A concurrent payer that loses the race gets the same no-op result.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn mark_invoice_paid(&self, invoice_id: InvoiceId) -> Result<PaidInvoice, BillingError> {
        let invoice = self.fetch_invoice(invoice_id).await?;
        if invoice.is_paid() {
            debug!("Invoice already paid");
            return Ok(PaidInvoice { invoice, newly_paid: false });
        }

        let batch = vec![
            Mutation::TransitionInvoice {
                invoice_id,
                from: InvoiceStatus::Unpaid,
                to: InvoiceStatus::Paid,
            },
            Mutation::AdjustBalance {
                account_id: invoice.account_id,
                delta: BalanceDelta::invoice_paid(&invoice),
            },
        ];

        match self.store.atomic_apply(batch).await {
            Ok(writes) => {
                let invoice = staged_invoice(&writes, invoice_id)?;
                info!(amount = %invoice.amount, "Invoice paid");
                Ok(PaidInvoice { invoice, newly_paid: true })
            }
            Err(e) if e.is_precondition_failed() => {
                let current = self.fetch_invoice(invoice_id).await?;
                if current.is_paid() {
                    debug!("Lost payment race; invoice already paid");
                    Ok(PaidInvoice { invoice: current, newly_paid: false })
                } else {
                    Err(BillingError::Storage(e))
                }
            }
            Err(e) if e.is_not_found() => Err(BillingError::not_found("Invoice", invoice_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Status change as requested through the API
    ///
    /// `PAID` pays the invoice. `UNPAID` on an unpaid invoice is a no-op.
    /// Anything else is rejected: paid invoices cannot be reopened and
    /// `OVERDUE` is derived, never stored.
    #[instrument(skip(self), fields(invoice_id = %invoice_id, status = %status))]
    pub async fn update_invoice_status(
        &self,
        invoice_id: InvoiceId,
        status: InvoiceStatus,
    ) -> Result<Invoice, BillingError> {
        match status {
            InvoiceStatus::Paid => Ok(self.mark_invoice_paid(invoice_id).await?.invoice),
            InvoiceStatus::Unpaid => {
                let invoice = self.fetch_invoice(invoice_id).await?;
                if invoice.is_paid() {
                    return Err(BillingError::validation("A paid invoice cannot be reopened"));
                }
                Ok(invoice)
            }
            InvoiceStatus::Overdue => Err(BillingError::validation(
                "OVERDUE is derived from the due date and cannot be set",
            )),
        }
    }

    /// Stores a transaction and applies its signed amount in one batch
    #[instrument(
        skip(self, request),
        fields(account_id = %request.account_id, kind = %request.transaction_type, amount = %request.amount)
    )]
    pub async fn record_transaction(&self, request: NewTransaction) -> Result<Transaction, BillingError> {
        request.validate()?;
        self.ensure_currency(&request.amount)?;
        self.require_account(request.account_id).await?;

        let transaction = request.into_transaction();
        let delta = BalanceDelta::transaction_recorded(&transaction);
        self.store
            .atomic_apply(vec![
                Mutation::Insert(Record::Transaction(transaction.clone())),
                Mutation::AdjustBalance {
                    account_id: transaction.account_id,
                    delta,
                },
            ])
            .await
            .map_err(|e| reference_on_missing_account(e, transaction.account_id))?;

        info!(transaction_id = %transaction.id, delta = %delta.change, "Transaction recorded");
        Ok(transaction)
    }

    /// Records a scanned receipt as a charge
    #[instrument(skip(self, receipt), fields(account_id = %account_id))]
    pub async fn record_receipt(
        &self,
        account_id: AccountId,
        receipt: ScannedReceipt,
        today: NaiveDate,
    ) -> Result<Transaction, BillingError> {
        let draft = receipt.into_transaction(account_id, today, self.settings.currency)?;
        self.record_transaction(draft).await
    }

    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn mark_email_sent(&self, invoice_id: InvoiceId) -> Result<Invoice, BillingError> {
        let writes = self
            .store
            .atomic_apply(vec![Mutation::MarkEmailSent { invoice_id }])
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    BillingError::not_found("Invoice", invoice_id)
                } else {
                    e.into()
                }
            })?;
        staged_invoice(&writes, invoice_id)
    }

    /// Emails an invoice to its account holder, then records `emailSent`
    ///
    /// A dispatch failure leaves the flag unchanged and is not retried.
    #[instrument(skip(self, dispatcher), fields(invoice_id = %invoice_id))]
    pub async fn send_invoice(
        &self,
        invoice_id: InvoiceId,
        dispatcher: &dyn NotificationDispatch,
    ) -> Result<Invoice, BillingError> {
        let invoice = self.fetch_invoice(invoice_id).await?;
        let account = self
            .store
            .get_account(invoice.account_id)
            .await
            .map_err(|e| reference_on_missing_account(e, invoice.account_id))?;

        if let Err(e) = dispatcher.send_invoice(&invoice, &account, &self.settings).await {
            warn!(error = %e, "Invoice email failed");
            return Err(e.into());
        }

        self.mark_email_sent(invoice_id).await
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn get_account(&self, account_id: AccountId) -> Result<Account, BillingError> {
        self.store.get_account(account_id).await.map_err(|e| {
            if e.is_not_found() {
                BillingError::not_found("Account", account_id)
            } else {
                e.into()
            }
        })
    }

    /// Stored invoice with its derived status
    pub async fn get_invoice(&self, invoice_id: InvoiceId, today: NaiveDate) -> Result<Invoice, BillingError> {
        Ok(self.fetch_invoice(invoice_id).await?.with_derived_status(today))
    }

    /// Accounts by name
    pub async fn list_accounts(&self) -> Result<Vec<Account>, BillingError> {
        Ok(self.store.list_accounts().await?)
    }

    /// Invoices newest first, with derived status
    pub async fn list_invoices(&self, today: NaiveDate) -> Result<Vec<Invoice>, BillingError> {
        Ok(self
            .store
            .list_invoices()
            .await?
            .into_iter()
            .map(|inv| inv.with_derived_status(today))
            .collect())
    }

    /// Transactions newest first, optionally for one account
    pub async fn list_transactions(&self, account_id: Option<AccountId>) -> Result<Vec<Transaction>, BillingError> {
        let transactions = self.store.list_transactions().await?;
        Ok(match account_id {
            Some(id) => transactions.into_iter().filter(|t| t.account_id == id).collect(),
            None => transactions,
        })
    }

    pub async fn credit_utilization(&self, account_id: AccountId) -> Result<CreditUtilization, BillingError> {
        Ok(self.get_account(account_id).await?.credit_utilization())
    }

    pub async fn overdue_report(&self, today: NaiveDate) -> Result<OverdueReport, BillingError> {
        let invoices = self.store.list_invoices().await?;
        lifecycle::overdue_report(&invoices, today, self.settings.currency)
    }

    pub async fn dashboard(&self, today: NaiveDate) -> Result<DashboardStats, BillingError> {
        let accounts = self.store.list_accounts().await?;
        let invoices = self.store.list_invoices().await?;
        lifecycle::dashboard_stats(&accounts, &invoices, today, &self.settings)
    }

    pub async fn health_check(&self) -> HealthCheckResult {
        self.store.health_check().await
    }

    /// Releases the store; call once on shutdown
    pub async fn close(&self) -> Result<(), BillingError> {
        Ok(self.store.close().await?)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn fetch_invoice(&self, invoice_id: InvoiceId) -> Result<Invoice, BillingError> {
        self.store.get_invoice(invoice_id).await.map_err(|e| {
            if e.is_not_found() {
                BillingError::not_found("Invoice", invoice_id)
            } else {
                e.into()
            }
        })
    }

    async fn require_account(&self, account_id: AccountId) -> Result<Account, BillingError> {
        self.store
            .get_account(account_id)
            .await
            .map_err(|e| reference_on_missing_account(e, account_id))
    }

    fn ensure_currency(&self, amount: &Money) -> Result<(), BillingError> {
        if amount.currency() != self.settings.currency {
            return Err(BillingError::validation(format!(
                "Amount is in {} but this ledger bills in {}",
                amount.currency(),
                self.settings.currency
            )));
        }
        Ok(())
    }
}

fn reference_on_missing_account(error: PortError, account_id: AccountId) -> BillingError {
    if error.is_not_found() {
        BillingError::reference("Account", account_id)
    } else {
        error.into()
    }
}

fn staged_invoice(writes: &[StagedWrite], invoice_id: InvoiceId) -> Result<Invoice, BillingError> {
    writes
        .iter()
        .find_map(|w| match &w.record {
            Record::Invoice(inv) if inv.id == invoice_id => Some(inv.clone()),
            _ => None,
        })
        .ok_or_else(|| BillingError::Storage(PortError::internal("batch result is missing the invoice")))
}
