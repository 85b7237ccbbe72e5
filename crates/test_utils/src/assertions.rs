//! Custom Test Assertions
//!
//! Assertion helpers for ledger types that give more useful failure
//! messages than plain `assert_eq!`.

use core_kernel::{AccountId, Money};
use domain_billing::{BillingError, ErrorKind, Invoice, InvoiceStatus, LedgerService, Transaction};
use rust_decimal::Decimal;

/// Asserts that two Money values are approximately equal within a tolerance
///
/// # Panics
///
/// Panics if the currencies don't match or the amounts differ by more than tolerance
pub fn assert_money_approx_eq(actual: &Money, expected: &Money, tolerance: Decimal) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );

    let diff = (actual.amount() - expected.amount()).abs();
    assert!(
        diff <= tolerance,
        "Money amounts differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual.amount(),
        expected.amount(),
        diff,
        tolerance
    );
}

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(money.is_zero(), "Expected zero money, got {}", money);
}

/// Asserts that a balance never went below zero
pub fn assert_non_negative(money: &Money) {
    assert!(!money.is_negative(), "Expected a non-negative balance, got {}", money);
}

/// Asserts that an error has the expected kind
pub fn assert_error_kind<T: std::fmt::Debug>(result: Result<T, BillingError>, expected: ErrorKind) {
    match result {
        Ok(value) => panic!("Expected {:?} error, got Ok({:?})", expected, value),
        Err(e) => assert_eq!(e.kind(), expected, "Unexpected error: {}", e),
    }
}

/// Asserts an invoice's derived status on `today`
pub fn assert_invoice_status(invoice: &Invoice, today: chrono::NaiveDate, expected: InvoiceStatus) {
    assert_eq!(
        invoice.classify_status(today),
        expected,
        "Invoice {} (due {}, stored {}) expected {} on {}",
        invoice.id,
        invoice.due_date,
        invoice.status,
        expected,
        today
    );
}

/// Asserts that an account's stored balance equals `opening` plus the
/// signed effect of every transaction recorded against it
pub async fn assert_balance_matches_transactions(
    service: &LedgerService,
    account_id: AccountId,
    opening: Decimal,
) {
    let account = service.get_account(account_id).await.expect("account exists");
    let transactions: Vec<Transaction> = service
        .list_transactions(Some(account_id))
        .await
        .expect("transactions readable");
    let expected = transactions
        .iter()
        .fold(opening, |acc, t| acc + t.balance_effect().amount());

    assert_eq!(
        account.current_balance.amount(),
        expected,
        "Balance {} does not match opening {} plus {} transactions",
        account.current_balance,
        opening,
        transactions.len()
    );
}
