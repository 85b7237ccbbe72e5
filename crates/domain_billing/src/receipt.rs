//! Scanned receipt intake
//!
//! The receipt-scanning service returns loosely typed JSON with float
//! amounts. [`ScannedReceipt`] is the explicit boundary structure: it is
//! parsed, checked, and converted to a [`NewTransaction`] draft that the
//! ledger service validates again before committing.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use core_kernel::{AccountId, Currency, Money};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::error::BillingError;
use crate::invoice::LineItem;
use crate::transaction::{NewTransaction, TransactionType};

/// One line read off a receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedItem {
    pub description: String,
    pub quantity: f64,
    /// Unit price
    pub price: f64,
}

/// Scanner output as received
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedReceipt {
    #[serde(default)]
    pub items: Vec<ScannedItem>,
    pub total_amount: f64,
    /// `YYYY-MM-DD`
    pub date: Option<String>,
    pub store_name: Option<String>,
    #[serde(default)]
    pub is_fuel_transaction: bool,
}

impl ScannedReceipt {
    pub fn from_json(raw: &str) -> Result<Self, BillingError> {
        serde_json::from_str(raw)
            .map_err(|e| BillingError::validation(format!("Unreadable receipt scan: {}", e)))
    }

    pub fn transaction_type(&self) -> TransactionType {
        if self.is_fuel_transaction {
            TransactionType::Fuel
        } else {
            TransactionType::Store
        }
    }

    /// Receipt date, or `today` when the scanner found none
    pub fn receipt_date(&self, today: NaiveDate) -> Result<NaiveDate, BillingError> {
        match self.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            None => Ok(today),
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| BillingError::validation(format!("Invalid receipt date: {}", raw))),
        }
    }

    /// Converts to a charge against `account_id`
    pub fn into_transaction(
        self,
        account_id: AccountId,
        today: NaiveDate,
        currency: Currency,
    ) -> Result<NewTransaction, BillingError> {
        let amount = Money::try_from_f64(self.total_amount, currency)?.round_to_currency();
        if !amount.is_positive() {
            return Err(BillingError::validation("Receipt total must be greater than zero"));
        }

        let date = self.receipt_date(today)?;
        let transaction_type = self.transaction_type();

        // The total is what gets charged; lines that cannot stand as billable
        // items (discounts, zero-price coupons, blank text) are dropped.
        let items: Vec<LineItem> = self
            .items
            .iter()
            .enumerate()
            .filter_map(|(position, item)| {
                let line = scanned_line(item, currency);
                if line.is_none() {
                    debug!(position, description = %item.description, "Skipping non-billable receipt line");
                }
                line
            })
            .collect();

        let description = match self.store_name.as_deref().map(str::trim) {
            Some(store) if !store.is_empty() => format!("Receipt from {}", store),
            _ => "Scanned receipt".to_string(),
        };

        let draft = NewTransaction::new(account_id, date, transaction_type, amount)
            .with_description(description)
            .with_items(items);
        draft.validate()?;
        Ok(draft)
    }
}

fn scanned_line(item: &ScannedItem, currency: Currency) -> Option<LineItem> {
    if !item.quantity.is_finite() || !item.price.is_finite() {
        return None;
    }
    let quantity = Decimal::from_f64(item.quantity)?.round_dp(4);
    let price = Money::try_from_f64(item.price, currency).ok()?;
    let line = LineItem::new(item.description.trim(), quantity, price);
    line.validate(0).ok().map(|_| line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()
    }

    #[test]
    fn test_fuel_receipt_with_date() {
        let raw = r#"{
            "items": [{"description": "Diesel", "quantity": 12.5, "price": 3.9}],
            "totalAmount": 48.75,
            "date": "2025-08-30",
            "storeName": "Ruthton Express",
            "isFuelTransaction": true
        }"#;
        let draft = ScannedReceipt::from_json(raw)
            .unwrap()
            .into_transaction(AccountId::new(), today(), Currency::USD)
            .unwrap();

        assert_eq!(draft.transaction_type, TransactionType::Fuel);
        assert_eq!(draft.amount.amount(), dec!(48.75));
        assert_eq!(draft.date, NaiveDate::from_ymd_opt(2025, 8, 30).unwrap());
        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.description.as_deref(), Some("Receipt from Ruthton Express"));
    }

    #[test]
    fn test_store_receipt_defaults_to_today() {
        let raw = r#"{"items": [], "totalAmount": 6.49, "isFuelTransaction": false}"#;
        let draft = ScannedReceipt::from_json(raw)
            .unwrap()
            .into_transaction(AccountId::new(), today(), Currency::USD)
            .unwrap();
        assert_eq!(draft.transaction_type, TransactionType::Store);
        assert_eq!(draft.date, today());
    }

    #[test]
    fn test_rejects_bad_totals_and_dates() {
        let zero = ScannedReceipt::from_json(r#"{"totalAmount": 0, "isFuelTransaction": false}"#)
            .unwrap()
            .into_transaction(AccountId::new(), today(), Currency::USD);
        assert!(matches!(zero, Err(BillingError::Validation(_))));

        let bad_date = ScannedReceipt::from_json(r#"{"totalAmount": 5, "date": "30/08/2025"}"#)
            .unwrap()
            .into_transaction(AccountId::new(), today(), Currency::USD);
        assert!(bad_date.is_err());

        assert!(ScannedReceipt::from_json(r#"{"items": []}"#).is_err());
    }

    #[test]
    fn test_discount_lines_do_not_reject_the_receipt() {
        let raw = r#"{
            "items": [
                {"description": "Hydraulic fluid", "quantity": 2, "price": 18.5},
                {"description": "Loyalty discount", "quantity": 1, "price": -3.0},
                {"description": "Free coffee", "quantity": 1, "price": 0},
                {"description": "  ", "quantity": 1, "price": 4.0}
            ],
            "totalAmount": 34.0,
            "isFuelTransaction": false
        }"#;
        let draft = ScannedReceipt::from_json(raw)
            .unwrap()
            .into_transaction(AccountId::new(), today(), Currency::USD)
            .unwrap();

        assert_eq!(draft.amount.amount(), dec!(34.00));
        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.items[0].description, "Hydraulic fluid");
    }
}
