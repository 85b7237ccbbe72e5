//! Invoices and invoice generation
//!
//! An invoice is created UNPAID with its amount frozen, moves to PAID exactly
//! once, and is reported OVERDUE only as a derived read. [`InvoiceDraft`]
//! turns a set of line items into a tax-inclusive [`NewInvoice`].

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{AccountId, Currency, InvoiceId, Money, MoneyError, Rate};

use crate::error::BillingError;

/// Default sales tax applied to generated invoices
pub const DEFAULT_TAX_PERCENT: Decimal = dec!(7.25);

/// Default payment terms in days
pub const DEFAULT_PAYMENT_TERMS_DAYS: u64 = 15;

/// Invoice status
///
/// Only `Unpaid` and `Paid` are ever stored. `Overdue` is produced by
/// [`Invoice::classify_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Unpaid,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Unpaid => "UNPAID",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Overdue => "OVERDUE",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UNPAID" => Ok(InvoiceStatus::Unpaid),
            "PAID" => Ok(InvoiceStatus::Paid),
            "OVERDUE" => Ok(InvoiceStatus::Overdue),
            other => Err(BillingError::validation(format!("Unknown invoice status: {}", other))),
        }
    }
}

/// A single billed line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: Decimal,
    /// Unit price
    pub price: Money,
}

impl LineItem {
    pub fn new(description: impl Into<String>, quantity: Decimal, price: Money) -> Self {
        Self {
            description: description.into(),
            quantity,
            price,
        }
    }

    /// `quantity * price`; `Overflow` when the product is out of range
    pub fn extended_price(&self) -> Result<Money, MoneyError> {
        self.price.multiply(self.quantity)
    }

    pub fn validate(&self, position: usize) -> Result<(), BillingError> {
        if self.description.trim().is_empty() {
            return Err(BillingError::validation(format!(
                "Item {} is missing a description",
                position + 1
            )));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(BillingError::validation(format!(
                "Item {} quantity must be greater than zero",
                position + 1
            )));
        }
        if !self.price.is_positive() {
            return Err(BillingError::validation(format!(
                "Item {} price must be greater than zero",
                position + 1
            )));
        }
        Ok(())
    }
}

/// A stored invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: InvoiceId,
    pub account_id: AccountId,
    pub date: NaiveDate,
    pub due_date: NaiveDate,
    /// Frozen at creation
    pub amount: Money,
    pub status: InvoiceStatus,
    pub items: Vec<LineItem>,
    pub email_sent: bool,
}

impl Invoice {
    /// OVERDUE iff unpaid and past due, otherwise the stored status
    pub fn classify_status(&self, today: NaiveDate) -> InvoiceStatus {
        if self.status == InvoiceStatus::Unpaid && self.due_date < today {
            InvoiceStatus::Overdue
        } else {
            self.status
        }
    }

    /// Whole days since the due date (negative before it)
    pub fn days_past_due(&self, today: NaiveDate) -> i64 {
        (today - self.due_date).num_days()
    }

    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatus::Paid
    }

    /// Copy with the derived status applied, for read endpoints
    pub fn with_derived_status(mut self, today: NaiveDate) -> Self {
        self.status = self.classify_status(today);
        self
    }
}

/// A fully priced invoice ready to be created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInvoice {
    pub account_id: AccountId,
    pub date: NaiveDate,
    pub due_date: NaiveDate,
    pub amount: Money,
    pub items: Vec<LineItem>,
}

impl NewInvoice {
    pub fn validate(&self) -> Result<(), BillingError> {
        if self.items.is_empty() {
            return Err(BillingError::validation("Invoice must contain at least one item"));
        }
        for (position, item) in self.items.iter().enumerate() {
            item.validate(position)?;
            if item.price.currency() != self.amount.currency() {
                return Err(BillingError::validation(format!(
                    "Item {} is priced in {} but the invoice is in {}",
                    position + 1,
                    item.price.currency(),
                    self.amount.currency()
                )));
            }
        }
        if self.amount.is_negative() {
            return Err(BillingError::validation("Invoice amount cannot be negative"));
        }
        if self.due_date < self.date {
            return Err(BillingError::validation("Due date cannot precede the invoice date"));
        }
        Ok(())
    }

    pub fn into_invoice(self) -> Invoice {
        Invoice {
            id: InvoiceId::new(),
            account_id: self.account_id,
            date: self.date,
            due_date: self.due_date,
            amount: self.amount,
            status: InvoiceStatus::Unpaid,
            items: self.items,
            email_sent: false,
        }
    }
}

/// Builder that prices line items into an invoice
///
/// ```rust,ignore
/// let invoice = InvoiceDraft::new(account_id, today)
///     .item(LineItem::new("Diesel", dec!(40), Money::new(dec!(3.899), Currency::USD)))
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    account_id: AccountId,
    date: NaiveDate,
    due_date: Option<NaiveDate>,
    tax_rate: Rate,
    payment_terms_days: u64,
    currency: Currency,
    items: Vec<LineItem>,
}

/// Subtotal, tax and total of a draft
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

impl InvoiceDraft {
    pub fn new(account_id: AccountId, date: NaiveDate) -> Self {
        Self {
            account_id,
            date,
            due_date: None,
            tax_rate: Rate::from_percentage(DEFAULT_TAX_PERCENT),
            payment_terms_days: DEFAULT_PAYMENT_TERMS_DAYS,
            currency: Currency::default(),
            items: Vec::new(),
        }
    }

    pub fn item(mut self, item: LineItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn items(mut self, items: impl IntoIterator<Item = LineItem>) -> Self {
        self.items.extend(items);
        self
    }

    pub fn due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn tax_rate(mut self, rate: Rate) -> Self {
        self.tax_rate = rate;
        self
    }

    pub fn payment_terms_days(mut self, days: u64) -> Self {
        self.payment_terms_days = days;
        self
    }

    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn totals(&self) -> Result<InvoiceTotals, BillingError> {
        let extended = self
            .items
            .iter()
            .map(LineItem::extended_price)
            .collect::<Result<Vec<_>, _>>()?;
        let subtotal = Money::sum(self.currency, &extended)?.round_to_currency();
        let tax = self.tax_rate.apply(&subtotal)?.round_to_currency();
        let total = subtotal.checked_add(&tax)?.round_to_currency();
        Ok(InvoiceTotals { subtotal, tax, total })
    }

    /// Prices the draft; the returned amount is final
    pub fn build(self) -> Result<NewInvoice, BillingError> {
        let totals = self.totals()?;
        let due_date = match self.due_date {
            Some(due) => due,
            None => self
                .date
                .checked_add_days(Days::new(self.payment_terms_days))
                .ok_or_else(|| BillingError::validation("Due date out of range"))?,
        };

        let invoice = NewInvoice {
            account_id: self.account_id,
            date: self.date,
            due_date,
            amount: totals.total,
            items: self.items,
        };
        invoice.validate()?;
        Ok(invoice)
    }
}
