//! Ledger service harnesses
//!
//! Wires a `LedgerService` to a store for tests, with helpers to seed
//! accounts directly.

use std::sync::Arc;

use domain_billing::store::mock::InMemoryLedgerStore;
use domain_billing::{Account, BillingSettings, LedgerService, LedgerStore, Record};

/// A service over a fresh in-memory store, plus a handle to the store for
/// failure injection
pub fn in_memory_service() -> (Arc<InMemoryLedgerStore>, LedgerService) {
    let store = Arc::new(InMemoryLedgerStore::new());
    let service = LedgerService::new(store.clone(), BillingSettings::default());
    (store, service)
}

/// A service over any store with default settings
pub fn service_over(store: Arc<dyn LedgerStore>) -> LedgerService {
    LedgerService::new(store, BillingSettings::default())
}

/// Stores `account` as-is, including its balance
pub async fn seed_account(store: &dyn LedgerStore, account: &Account) {
    store
        .put(Record::Account(account.clone()))
        .await
        .expect("seed account");
}
