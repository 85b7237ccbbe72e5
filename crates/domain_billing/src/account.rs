//! Customer house accounts
//!
//! An [`Account`] is a customer credit line. Its `current_balance` is the
//! signed amount the customer owes and is only ever changed through
//! [`crate::store::Mutation::AdjustBalance`] inside an atomic apply.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::{AccountId, Currency, Money};

use crate::error::BillingError;

/// Utilization ratio above which an account is flagged as nearing its limit
pub const CREDIT_WARNING_RATIO: Decimal = dec!(0.90);

/// A customer house account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Advisory limit; never blocks charges
    pub credit_limit: Money,
    /// Signed amount owed
    pub current_balance: Money,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn currency(&self) -> Currency {
        self.current_balance.currency()
    }

    /// Credit utilization for display
    pub fn credit_utilization(&self) -> CreditUtilization {
        CreditUtilization::of(self)
    }
}

/// Fields supplied when opening an account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub credit_limit: Option<Money>,
}

impl NewAccount {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            ..Default::default()
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_credit_limit(mut self, limit: Money) -> Self {
        self.credit_limit = Some(limit);
        self
    }

    /// Checks required fields before any store access
    pub fn validate(&self) -> Result<(), BillingError> {
        if self.name.trim().is_empty() {
            return Err(BillingError::validation("Account name is required"));
        }

        let email = self.email.trim();
        if email.is_empty() {
            return Err(BillingError::validation("Account email is required"));
        }
        if !email.contains('@') || !email.contains('.') {
            return Err(BillingError::validation(format!("Invalid email address: {}", email)));
        }

        if let Some(limit) = &self.credit_limit {
            if limit.is_negative() {
                return Err(BillingError::validation("Credit limit cannot be negative"));
            }
        }

        Ok(())
    }

    /// Builds the account record with a zero opening balance
    pub fn into_account(self, currency: Currency, now: DateTime<Utc>) -> Account {
        let credit_limit = self
            .credit_limit
            .map(|limit| Money::new(limit.amount(), currency))
            .unwrap_or_else(|| Money::zero(currency));

        Account {
            id: AccountId::new(),
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
            credit_limit,
            current_balance: Money::zero(currency),
            created_at: now,
        }
    }
}

/// How much of the advisory credit limit an account is using
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditUtilization {
    /// Balance divided by limit; `None` when no limit is set
    pub ratio: Option<Decimal>,
    /// Limit minus balance, never below zero
    pub available: Money,
    pub near_limit: bool,
}

impl CreditUtilization {
    pub fn of(account: &Account) -> Self {
        let limit = account.credit_limit.amount();
        let balance = account.current_balance.amount();

        if limit <= Decimal::ZERO {
            return Self {
                ratio: None,
                available: Money::zero(account.currency()),
                near_limit: false,
            };
        }

        // Out-of-range quotients only arise from balances far past the limit
        // in one direction or the other.
        let ratio = balance.checked_div(limit).map(|r| r.round_dp(4));
        let available = match limit.checked_sub(balance) {
            Some(room) => Money::new(room, account.currency()).floor_at_zero(),
            None if balance.is_sign_positive() => Money::zero(account.currency()),
            None => Money::new(Decimal::MAX, account.currency()),
        };

        Self {
            ratio,
            available,
            near_limit: ratio.map_or(balance.is_sign_positive(), |r| r > CREDIT_WARNING_RATIO),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_with(balance: Decimal, limit: Decimal) -> Account {
        let mut account = NewAccount::new("Acme Hauling", "ap@acme.test")
            .with_credit_limit(Money::new(limit, Currency::USD))
            .into_account(Currency::USD, Utc::now());
        account.current_balance = Money::new(balance, Currency::USD);
        account
    }

    #[test]
    fn test_validate_requires_name_and_email() {
        assert!(NewAccount::new("", "a@b.com").validate().is_err());
        assert!(NewAccount::new("Acme", "  ").validate().is_err());
        assert!(NewAccount::new("Acme", "not-an-email").validate().is_err());
        assert!(NewAccount::new("Acme", "a@b.com").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_limit() {
        let request = NewAccount::new("Acme", "a@b.com")
            .with_credit_limit(Money::new(dec!(-1), Currency::USD));
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_new_account_starts_at_zero() {
        let account = NewAccount::new(" Acme ", "a@b.com")
            .with_phone("")
            .into_account(Currency::USD, Utc::now());
        assert!(account.current_balance.is_zero());
        assert_eq!(account.name, "Acme");
        assert!(account.phone.is_none());
    }

    #[test]
    fn test_credit_utilization_warning() {
        let util = account_with(dec!(950), dec!(1000)).credit_utilization();
        assert_eq!(util.ratio, Some(dec!(0.95)));
        assert_eq!(util.available.amount(), dec!(50));
        assert!(util.near_limit);

        let util = account_with(dec!(900), dec!(1000)).credit_utilization();
        assert!(!util.near_limit);
    }

    #[test]
    fn test_credit_utilization_without_limit() {
        let util = account_with(dec!(300), dec!(0)).credit_utilization();
        assert!(util.ratio.is_none());
        assert!(!util.near_limit);
    }

    #[test]
    fn test_over_limit_has_no_available_credit() {
        let util = account_with(dec!(1500), dec!(1000)).credit_utilization();
        assert!(util.available.is_zero());
        assert!(util.near_limit);
    }

    #[test]
    fn test_utilization_of_extreme_balance_does_not_panic() {
        let util = account_with(Decimal::MAX, dec!(0.01)).credit_utilization();
        assert!(util.ratio.is_none());
        assert!(util.available.is_zero());
        assert!(util.near_limit);
    }
}
