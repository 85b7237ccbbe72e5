//! Charge and payment transactions
//!
//! Transactions are immutable once recorded. Each type carries an explicit
//! sign: fuel and store purchases charge the account, payments credit it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{AccountId, Money, TransactionId};

use crate::error::BillingError;
use crate::invoice::LineItem;

/// Kind of account activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Fuel,
    Store,
    Payment,
}

impl TransactionType {
    /// Applies this type's sign to a positive amount
    pub fn signed(&self, amount: Money) -> Money {
        match self {
            TransactionType::Fuel | TransactionType::Store => amount,
            TransactionType::Payment => -amount,
        }
    }

    pub fn is_charge(&self) -> bool {
        !matches!(self, TransactionType::Payment)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Fuel => "FUEL",
            TransactionType::Store => "STORE",
            TransactionType::Payment => "PAYMENT",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransactionType::Fuel => "Fuel Purchase",
            TransactionType::Store => "Store Purchase",
            TransactionType::Payment => "Account Payment (Credit)",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FUEL" => Ok(TransactionType::Fuel),
            "STORE" => Ok(TransactionType::Store),
            "PAYMENT" => Ok(TransactionType::Payment),
            other => Err(BillingError::validation(format!("Unknown transaction type: {}", other))),
        }
    }
}

/// A recorded transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// Unsigned amount as entered
    pub amount: Money,
    pub description: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

impl Transaction {
    /// The balance change this transaction caused
    pub fn balance_effect(&self) -> Money {
        self.transaction_type.signed(self.amount)
    }
}

/// A transaction draft from manual entry or a scanned receipt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub account_id: AccountId,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: Money,
    pub description: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

impl NewTransaction {
    pub fn new(
        account_id: AccountId,
        date: NaiveDate,
        transaction_type: TransactionType,
        amount: Money,
    ) -> Self {
        Self {
            account_id,
            date,
            transaction_type,
            amount,
            description: None,
            items: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_items(mut self, items: Vec<LineItem>) -> Self {
        self.items = items;
        self
    }

    /// Amounts are entered unsigned; the type carries the direction
    pub fn validate(&self) -> Result<(), BillingError> {
        if self.amount.is_zero() {
            return Err(BillingError::validation("Transaction amount must be non-zero"));
        }
        if self.amount.is_negative() {
            return Err(BillingError::validation(
                "Transaction amount must be positive; the type sets its direction",
            ));
        }
        for (position, item) in self.items.iter().enumerate() {
            item.validate(position)?;
        }
        Ok(())
    }

    pub fn into_transaction(self) -> Transaction {
        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        Transaction {
            id: TransactionId::new(),
            account_id: self.account_id,
            date: self.date,
            transaction_type: self.transaction_type,
            amount: self.amount,
            description,
            items: self.items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;
    use rust_decimal_macros::dec;

    fn draft(kind: TransactionType, amount: Money) -> NewTransaction {
        NewTransaction::new(
            AccountId::new(),
            NaiveDate::from_ymd_opt(2025, 4, 2).unwrap(),
            kind,
            amount,
        )
    }

    #[test]
    fn test_signs_per_type() {
        let amount = Money::new(dec!(20), Currency::USD);
        assert_eq!(TransactionType::Fuel.signed(amount).amount(), dec!(20));
        assert_eq!(TransactionType::Store.signed(amount).amount(), dec!(20));
        assert_eq!(TransactionType::Payment.signed(amount).amount(), dec!(-20));
    }

    #[test]
    fn test_validate_amount() {
        let usd = |v| Money::new(v, Currency::USD);
        assert!(draft(TransactionType::Fuel, usd(dec!(0))).validate().is_err());
        assert!(draft(TransactionType::Payment, usd(dec!(-5))).validate().is_err());
        assert!(draft(TransactionType::Payment, usd(dec!(5))).validate().is_ok());
    }

    #[test]
    fn test_type_serializes_as_type_field() {
        let txn = draft(TransactionType::Store, Money::new(dec!(12), Currency::USD))
            .with_description("  ")
            .into_transaction();
        let json = serde_json::to_value(&txn).unwrap();
        assert_eq!(json["type"], "STORE");
        assert!(json["description"].is_null());
    }
}
