//! Request and response bodies
//!
//! Request types carry `validator` rules for shape checks (required fields,
//! lengths, email syntax). Ledger rules are enforced again by the service.

pub mod accounts;
pub mod invoices;
pub mod receipts;
pub mod settings;
pub mod transactions;

use chrono::{NaiveDate, Utc};
use core_kernel::{Currency, Money};
use domain_billing::LineItem;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// One line as entered by a clerk
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LineItemRequest {
    #[validate(length(min = 1, max = 200, message = "description is required"))]
    pub description: String,
    pub quantity: Decimal,
    /// Unit price
    pub price: Decimal,
}

impl LineItemRequest {
    pub fn into_line_item(self, currency: Currency) -> LineItem {
        LineItem::new(self.description, self.quantity, Money::new(self.price, currency))
    }
}

/// The business date requests default to
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}
