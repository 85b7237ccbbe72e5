//! Document store integration tests
//!
//! Drive the ledger service over `DocumentLedgerStore` to check that the
//! optimistic commit keeps balances exact under contention and that the
//! snapshot file survives a close and reopen.

use std::path::PathBuf;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{AdapterConfig, Currency, Money};
use domain_billing::{ErrorKind, LedgerService, LedgerStore, NewTransaction, TransactionType};
use infra_db::DocumentLedgerStore;
use test_utils::{
    assert_balance_matches_transactions, assert_error_kind, service_over, IdFixtures, LineItemFixtures,
    TemporalFixtures, TestAccountBuilder, TestInvoiceBuilder,
};

fn usd(amount: Decimal) -> Money {
    Money::new(amount, Currency::USD)
}

fn contended_config(max_retries: u32) -> AdapterConfig {
    DocumentLedgerStore::default_config().with_retries(max_retries, 1)
}

fn setup(config: AdapterConfig) -> (Arc<DocumentLedgerStore>, LedgerService) {
    let store = Arc::new(DocumentLedgerStore::in_memory(config));
    let service = service_over(store.clone());
    (store, service)
}

fn snapshot_path() -> PathBuf {
    std::env::temp_dir().join(format!("ledger-snapshot-{}.json", uuid::Uuid::new_v4()))
}

fn fuel(account_id: core_kernel::AccountId, amount: Decimal) -> NewTransaction {
    NewTransaction::new(account_id, TemporalFixtures::today(), TransactionType::Fuel, usd(amount))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_charges_sum_exactly() {
    let (_store, service) = setup(contended_config(64));
    let account_id = service
        .create_account(TestAccountBuilder::new().build_request())
        .await
        .unwrap()
        .id;

    let handles: Vec<_> = (1..=25)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move { service.record_transaction(fuel(account_id, Decimal::from(i))).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let account = service.get_account(account_id).await.unwrap();
    assert_eq!(account.current_balance.amount(), dec!(325));
    assert_balance_matches_transactions(&service, account_id, Decimal::ZERO).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exhausted_retries_leave_no_partial_effect() {
    let (_store, service) = setup(contended_config(0));
    let account_id = service
        .create_account(TestAccountBuilder::new().build_request())
        .await
        .unwrap()
        .id;

    let handles: Vec<_> = (0..25)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.record_transaction(fuel(account_id, dec!(4))).await })
        })
        .collect();

    let mut succeeded = 0u32;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(e) => {
                assert_eq!(e.kind(), ErrorKind::Storage);
                assert!(e.is_retryable());
            }
        }
    }

    let account = service.get_account(account_id).await.unwrap();
    assert_eq!(account.current_balance.amount(), dec!(4) * Decimal::from(succeeded));
    assert_eq!(
        service.list_transactions(Some(account_id)).await.unwrap().len(),
        succeeded as usize
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_payers_decrement_once() {
    let (_store, service) = setup(contended_config(64));
    let account_id = service
        .create_account(TestAccountBuilder::new().build_request())
        .await
        .unwrap()
        .id;
    let invoice = service
        .create_invoice(TestInvoiceBuilder::for_amount(account_id, usd(dec!(100))).build_request())
        .await
        .unwrap();
    let invoice_id = invoice.id;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.mark_invoice_paid(invoice_id).await })
        })
        .collect();

    let mut newly_paid = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().newly_paid {
            newly_paid += 1;
        }
    }

    assert_eq!(newly_paid, 1);
    let account = service.get_account(account_id).await.unwrap();
    assert!(account.current_balance.is_zero());
}

#[tokio::test]
async fn test_business_errors_are_not_retried() {
    let (store, service) = setup(contended_config(8));

    let result = service
        .record_transaction(fuel(IdFixtures::unknown_account_id(), dec!(10)))
        .await;

    assert_error_kind(result, ErrorKind::Reference);
    assert_eq!(store.conflict_count(), 0);
}

#[tokio::test]
async fn test_snapshot_survives_reopen() {
    let path = snapshot_path();

    let (account_id, invoice_id) = {
        let store = Arc::new(
            DocumentLedgerStore::open(Some(path.clone()), DocumentLedgerStore::default_config())
                .await
                .unwrap(),
        );
        let service = service_over(store.clone());
        let account = service
            .create_account(TestAccountBuilder::new().with_name("Snapshot Farms").build_request())
            .await
            .unwrap();
        let invoice = service
            .create_invoice(
                TestInvoiceBuilder::new(account.id)
                    .with_items(vec![LineItemFixtures::diesel(), LineItemFixtures::wiper_fluid()])
                    .build_request(),
            )
            .await
            .unwrap();
        service.close().await.unwrap();
        (account.id, invoice.id)
    };

    let reopened = Arc::new(
        DocumentLedgerStore::open(Some(path.clone()), DocumentLedgerStore::default_config())
            .await
            .unwrap(),
    );
    let service = service_over(reopened.clone());

    let account = service.get_account(account_id).await.unwrap();
    assert_eq!(account.name, "Snapshot Farms");
    // 39.00 diesel + 8.50 wiper fluid
    assert_eq!(account.current_balance.amount(), dec!(47.50));

    let invoice = service
        .get_invoice(invoice_id, TemporalFixtures::today())
        .await
        .unwrap();
    assert_eq!(invoice.items.len(), 2);
    assert_eq!(invoice.items[0].description, "Diesel");
    assert_eq!(invoice.items[1].description, "Wiper fluid");

    reopened.close().await.unwrap();
    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn test_missing_snapshot_opens_empty() {
    let store = DocumentLedgerStore::open(Some(snapshot_path()), DocumentLedgerStore::default_config())
        .await
        .unwrap();

    let service = service_over(Arc::new(store));
    assert!(service.list_accounts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_health_reflects_lifecycle() {
    let (store, service) = setup(DocumentLedgerStore::default_config());
    assert!(service.health_check().await.is_healthy());

    store.close().await.unwrap();
    assert!(!service.health_check().await.is_healthy());
    assert_error_kind(service.list_accounts().await, ErrorKind::Storage);
}

#[tokio::test]
async fn test_unwritable_snapshot_leaves_no_effect() {
    let dir = std::env::temp_dir().join(format!("ledger-dir-{}", uuid::Uuid::new_v4()));
    tokio::fs::create_dir(&dir).await.unwrap();
    let store = Arc::new(
        DocumentLedgerStore::open(Some(dir.join("ledger.json")), DocumentLedgerStore::default_config())
            .await
            .unwrap(),
    );
    let service = service_over(store.clone());
    let account_id = service
        .create_account(TestAccountBuilder::new().build_request())
        .await
        .unwrap()
        .id;

    // Every later snapshot write fails
    tokio::fs::remove_dir_all(&dir).await.unwrap();

    for _ in 0..2 {
        assert_error_kind(service.record_transaction(fuel(account_id, dec!(45.50))).await, ErrorKind::Storage);
    }
    assert_error_kind(
        service.create_account(TestAccountBuilder::new().build_request()).await,
        ErrorKind::Storage,
    );

    let account = service.get_account(account_id).await.unwrap();
    assert!(account.current_balance.is_zero());
    assert_eq!(store.version_of(account_id.into()).await, Some(1));
    assert!(service.list_transactions(Some(account_id)).await.unwrap().is_empty());
    assert_eq!(service.list_accounts().await.unwrap().len(), 1);

    let stray = TestAccountBuilder::new().build();
    assert!(store.put(domain_billing::Record::Account(stray.clone())).await.is_err());
    assert!(store.get(stray.id.into()).await.unwrap_err().is_not_found());
}
