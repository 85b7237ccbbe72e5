//! Property-Based Test Generators
//!
//! Proptest strategies for ledger data that respects domain invariants.

use chrono::{Duration, NaiveDate};
use core_kernel::{AccountId, Currency, Money};
use domain_billing::{LineItem, NewTransaction, TransactionType};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Strategy for the currencies the ledger supports
pub fn currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::USD),
        Just(Currency::CAD),
        Just(Currency::EUR),
        Just(Currency::GBP),
    ]
}

/// Strategy for positive amounts in minor units (1 cent to 100,000.00)
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..10_000_000i64
}

/// Strategy for positive USD amounts
pub fn usd_money_strategy() -> impl Strategy<Value = Money> {
    positive_amount_minor_strategy().prop_map(|minor| Money::from_minor(minor, Currency::USD))
}

/// Strategy for positive amounts in any supported currency
pub fn positive_money_strategy() -> impl Strategy<Value = Money> {
    (positive_amount_minor_strategy(), currency_strategy())
        .prop_map(|(minor, currency)| Money::from_minor(minor, currency))
}

/// Strategy for item quantities (0.001 to 500.000)
pub fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..500_000i64).prop_map(|n| Decimal::new(n, 3))
}

/// Strategy for tax percentages (0.00% to 15.00%)
pub fn tax_percentage_strategy() -> impl Strategy<Value = Decimal> {
    (0u32..1500u32).prop_map(|n| Decimal::new(n as i64, 2))
}

pub fn transaction_type_strategy() -> impl Strategy<Value = TransactionType> {
    prop_oneof![
        Just(TransactionType::Fuel),
        Just(TransactionType::Store),
        Just(TransactionType::Payment),
    ]
}

/// Strategy for business dates in 2025
pub fn date_2025_strategy() -> impl Strategy<Value = NaiveDate> {
    (0i64..365i64).prop_map(|days| NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + Duration::days(days))
}

/// Strategy for valid USD line items
pub fn line_item_strategy() -> impl Strategy<Value = LineItem> {
    ("[A-Z][a-z]{3,12}", quantity_strategy(), usd_money_strategy())
        .prop_map(|(description, quantity, price)| LineItem::new(description, quantity, price))
}

/// Strategy for a valid USD transaction request against `account_id`
pub fn new_transaction_strategy(account_id: AccountId) -> impl Strategy<Value = NewTransaction> {
    (date_2025_strategy(), transaction_type_strategy(), usd_money_strategy())
        .prop_map(move |(date, kind, amount)| NewTransaction::new(account_id, date, kind, amount))
}

/// Strategy for a batch of transaction requests against one account
pub fn transaction_batch_strategy(
    account_id: AccountId,
    max: usize,
) -> impl Strategy<Value = Vec<NewTransaction>> {
    proptest::collection::vec(new_transaction_strategy(account_id), 1..=max)
}

/// Strategy for valid email addresses
pub fn email_strategy() -> impl Strategy<Value = String> {
    ("[a-z]{5,10}", "[a-z]{3,8}").prop_map(|(local, domain)| format!("{}@{}.com", local, domain))
}

/// Strategy for business names
pub fn account_name_strategy() -> impl Strategy<Value = String> {
    ("[A-Z][a-z]{2,10}", prop_oneof![Just("Farms"), Just("Trucking"), Just("Co-op"), Just("Electric")])
        .prop_map(|(stem, suffix)| format!("{} {}", stem, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::IdFixtures;

    proptest! {
        #[test]
        fn usd_money_is_positive(money in usd_money_strategy()) {
            prop_assert!(money.is_positive());
            prop_assert_eq!(money.currency(), Currency::USD);
        }

        #[test]
        fn generated_line_items_validate(item in line_item_strategy()) {
            prop_assert!(item.validate(0).is_ok());
        }

        #[test]
        fn generated_transactions_validate(txn in new_transaction_strategy(IdFixtures::account_id())) {
            prop_assert!(txn.validate().is_ok());
        }

        #[test]
        fn generated_emails_have_domain(email in email_strategy()) {
            prop_assert!(email.contains('@'));
            prop_assert!(email.ends_with(".com"));
        }
    }
}
