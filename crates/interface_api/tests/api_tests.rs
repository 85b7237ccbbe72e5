//! HTTP API tests
//!
//! Drives the router end to end with `axum-test`, over the in-memory mock
//! store (for failure injection) and the document store.

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::Duration;
use core_kernel::{Currency, Money};
use domain_billing::notification::mock::RecordingDispatcher;
use domain_billing::store::mock::InMemoryLedgerStore;
use domain_billing::{Account, Invoice, InvoiceStatus, LedgerService, Transaction, TransactionType};
use infra_db::DocumentLedgerStore;
use interface_api::auth::{create_token, permissions};
use interface_api::config::ApiConfig;
use interface_api::create_router;
use interface_api::dto::today;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use test_utils::{in_memory_service, service_over};

const SECRET: &str = "api-test-secret";

struct TestApp {
    server: TestServer,
    store: Arc<InMemoryLedgerStore>,
    dispatcher: Arc<RecordingDispatcher>,
    token: String,
}

fn config() -> ApiConfig {
    ApiConfig {
        jwt_secret: SECRET.to_string(),
        ..ApiConfig::default()
    }
}

fn token(roles: &[&str]) -> String {
    create_token("clerk-1", roles.iter().map(|r| r.to_string()).collect(), SECRET, 300).unwrap()
}

fn server_for(service: LedgerService, dispatcher: Arc<RecordingDispatcher>) -> TestServer {
    TestServer::new(create_router(service, dispatcher, config())).unwrap()
}

fn spawn_app() -> TestApp {
    let (store, service) = in_memory_service();
    let dispatcher = Arc::new(RecordingDispatcher::new());
    TestApp {
        server: server_for(service, dispatcher.clone()),
        store,
        dispatcher,
        token: token(&[permissions::ADMIN]),
    }
}

fn usd(amount: rust_decimal::Decimal) -> Money {
    Money::new(amount, Currency::USD)
}

impl TestApp {
    async fn create_account(&self, name: &str) -> Account {
        let response = self
            .server
            .post("/api/v1/accounts")
            .authorization_bearer(&self.token)
            .json(&json!({ "name": name, "email": "ap@hilltop.test", "phone": "555-0100", "creditLimit": 1000 }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Account>()
    }

    async fn get_account(&self, account: &Account) -> Account {
        let response = self
            .server
            .get(&format!("/api/v1/accounts/{}", account.id))
            .authorization_bearer(&self.token)
            .await;
        response.assert_status_ok();
        response.json::<Account>()
    }

    /// Untaxed single-line invoice for `amount`
    async fn create_invoice(&self, account: &Account, amount: &str, due_days_ago: Option<i64>) -> Invoice {
        let mut body = json!({
            "accountId": account.id,
            "items": [{ "description": "Diesel", "quantity": 1, "price": amount }],
            "taxRate": 0,
        });
        if let Some(days) = due_days_ago {
            let due = today() - Duration::days(days);
            body["date"] = json!(due - Duration::days(15));
            body["dueDate"] = json!(due);
        }
        let response = self
            .server
            .post("/api/v1/invoices")
            .authorization_bearer(&self.token)
            .json(&body)
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Invoice>()
    }
}

// ============================================================================
// Health and auth
// ============================================================================

#[tokio::test]
async fn test_health_is_public() {
    let app = spawn_app();
    let response = app.server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "healthy");
}

#[tokio::test]
async fn test_readiness_reports_unreachable_store_with_200() {
    let app = spawn_app();

    let ready = app.server.get("/health/ready").await;
    ready.assert_status_ok();
    assert_eq!(ready.json::<Value>()["database"], "connected");

    app.store.set_unavailable(true);
    let degraded = app.server.get("/health/ready").await;
    degraded.assert_status_ok();
    let body = degraded.json::<Value>();
    assert_eq!(body["database"], "unreachable");
    assert_eq!(body["retryable"], true);
}

#[tokio::test]
async fn test_missing_or_bad_token_is_401() {
    let app = spawn_app();
    app.server
        .get("/api/v1/accounts")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    app.server
        .get("/api/v1/accounts")
        .authorization_bearer("not-a-jwt")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_read_only_role_cannot_write() {
    let app = spawn_app();
    let reader = token(&[permissions::LEDGER_READ]);

    app.server
        .get("/api/v1/accounts")
        .authorization_bearer(&reader)
        .await
        .assert_status_ok();
    app.server
        .post("/api/v1/accounts")
        .authorization_bearer(&reader)
        .json(&json!({ "name": "Hilltop", "email": "ap@hilltop.test" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .post("/api/v1/settings/test-email")
        .authorization_bearer(&token(&[permissions::LEDGER_WRITE]))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

// ============================================================================
// Accounts
// ============================================================================

#[tokio::test]
async fn test_accounts_listed_by_name() {
    let app = spawn_app();
    app.create_account("Zephyr Towing").await;
    app.create_account("Acme Hauling").await;

    let response = app.server.get("/api/v1/accounts").authorization_bearer(&app.token).await;
    response.assert_status_ok();
    let names: Vec<String> = response.json::<Vec<Account>>().into_iter().map(|a| a.name).collect();
    assert_eq!(names, vec!["Acme Hauling", "Zephyr Towing"]);
}

#[tokio::test]
async fn test_new_account_starts_at_zero() {
    let app = spawn_app();
    let account = app.create_account("Hilltop Farms").await;
    assert!(account.current_balance.is_zero());
    assert_eq!(account.credit_limit, usd(dec!(1000)));

    let detail = app
        .server
        .get(&format!("/api/v1/accounts/{}", account.id))
        .authorization_bearer(&app.token)
        .await
        .json::<Value>();
    assert_eq!(detail["name"], "Hilltop Farms");
    assert!(detail["credit"].is_object());
}

#[tokio::test]
async fn test_account_shape_errors_are_422() {
    let app = spawn_app();
    let response = app
        .server
        .post("/api/v1/accounts")
        .authorization_bearer(&app.token)
        .json(&json!({ "name": "", "email": "nope" }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body = response.json::<Value>();
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_unknown_account_is_404_and_bad_id_is_400() {
    let app = spawn_app();
    app.server
        .get("/api/v1/accounts/ACC-00000000-0000-0000-0000-000000000000")
        .authorization_bearer(&app.token)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .get("/api/v1/accounts/garbage")
        .authorization_bearer(&app.token)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Invoices
// ============================================================================

#[tokio::test]
async fn test_invoice_pay_cycle() {
    let app = spawn_app();
    let account = app.create_account("Hilltop Farms").await;

    let invoice = app.create_invoice(&account, "100.00", None).await;
    assert_eq!(invoice.amount, usd(dec!(100)));
    assert_eq!(invoice.status, InvoiceStatus::Unpaid);
    assert_eq!(app.get_account(&account).await.current_balance, usd(dec!(100)));

    let paid = app
        .server
        .put(&format!("/api/v1/invoices/{}/status", invoice.id))
        .authorization_bearer(&app.token)
        .json(&json!({ "status": "PAID" }))
        .await;
    paid.assert_status_ok();
    assert_eq!(paid.json::<Invoice>().status, InvoiceStatus::Paid);
    assert!(app.get_account(&account).await.current_balance.is_zero());

    // Paying again changes nothing
    let again = app
        .server
        .post(&format!("/api/v1/invoices/{}/pay", invoice.id))
        .authorization_bearer(&app.token)
        .await;
    again.assert_status_ok();
    assert_eq!(again.json::<Value>()["newlyPaid"], false);
    assert!(app.get_account(&account).await.current_balance.is_zero());
}

#[tokio::test]
async fn test_invoice_priced_with_default_tax() {
    let app = spawn_app();
    let account = app.create_account("Hilltop Farms").await;

    let response = app
        .server
        .post("/api/v1/invoices")
        .authorization_bearer(&app.token)
        .json(&json!({
            "accountId": account.id,
            "items": [{ "description": "Diesel", "quantity": 10, "price": 4 }],
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let invoice = response.json::<Invoice>();
    // 40.00 + 7.25%
    assert_eq!(invoice.amount, usd(dec!(42.90)));
    assert_eq!(invoice.due_date, invoice.date + Duration::days(15));
}

#[tokio::test]
async fn test_invoice_for_unknown_account_is_409() {
    let app = spawn_app();
    let response = app
        .server
        .post("/api/v1/invoices")
        .authorization_bearer(&app.token)
        .json(&json!({
            "accountId": "00000000-0000-0000-0000-000000000000",
            "items": [{ "description": "Diesel", "quantity": 1, "price": 10 }],
        }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["error"], "reference_error");
    assert_eq!(app.store.commit_count(), 0);
}

#[tokio::test]
async fn test_invoice_without_items_is_422() {
    let app = spawn_app();
    let account = app.create_account("Hilltop Farms").await;
    app.server
        .post("/api/v1/invoices")
        .authorization_bearer(&app.token)
        .json(&json!({ "accountId": account.id, "items": [] }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_oversized_line_is_422() {
    let app = spawn_app();
    let account = app.create_account("Hilltop Farms").await;
    let response = app
        .server
        .post("/api/v1/invoices")
        .authorization_bearer(&app.token)
        .json(&json!({
            "accountId": account.id,
            "items": [{ "description": "Diesel", "quantity": "100000000000000000000", "price": "10000000000" }],
        }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert!(app.get_account(&account).await.current_balance.is_zero());
}

#[tokio::test]
async fn test_amount_override_must_be_positive() {
    let app = spawn_app();
    let account = app.create_account("Hilltop Farms").await;
    for amount in [json!(0), json!("-5.00")] {
        app.server
            .post("/api/v1/invoices")
            .authorization_bearer(&app.token)
            .json(&json!({
                "accountId": account.id,
                "items": [{ "description": "Diesel", "quantity": 1, "price": 10 }],
                "amount": amount,
            }))
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let response = app
        .server
        .post("/api/v1/invoices")
        .authorization_bearer(&app.token)
        .json(&json!({
            "accountId": account.id,
            "items": [{ "description": "Diesel", "quantity": 1, "price": 10 }],
            "amount": "12.34",
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    assert_eq!(response.json::<Invoice>().amount, usd(dec!(12.34)));
}

#[tokio::test]
async fn test_setting_overdue_directly_is_rejected() {
    let app = spawn_app();
    let account = app.create_account("Hilltop Farms").await;
    let invoice = app.create_invoice(&account, "20.00", None).await;

    app.server
        .put(&format!("/api/v1/invoices/{}/status", invoice.id))
        .authorization_bearer(&app.token)
        .json(&json!({ "status": "OVERDUE" }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(app.get_account(&account).await.current_balance, usd(dec!(20)));
}

#[tokio::test]
async fn test_past_due_invoice_listed_as_overdue() {
    let app = spawn_app();
    let account = app.create_account("Hilltop Farms").await;
    let current = app.create_invoice(&account, "10.00", None).await;
    let late = app.create_invoice(&account, "200.00", Some(45)).await;

    let listed = app
        .server
        .get("/api/v1/invoices")
        .authorization_bearer(&app.token)
        .await
        .json::<Vec<Invoice>>();
    assert_eq!(listed.len(), 2);
    // Newest first
    assert_eq!(listed[0].id, current.id);
    assert_eq!(listed[1].id, late.id);
    assert_eq!(listed[1].status, InvoiceStatus::Overdue);
    assert_eq!(listed[1].items.len(), 1);

    let report = app
        .server
        .get("/api/v1/reports/overdue")
        .authorization_bearer(&app.token)
        .await
        .json::<Value>();
    assert_eq!(report["invoices"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_storage_failure_is_503_and_writes_nothing() {
    let app = spawn_app();
    let account = app.create_account("Hilltop Farms").await;
    let commits = app.store.commit_count();

    app.store.fail_next_apply();
    let response = app
        .server
        .post("/api/v1/invoices")
        .authorization_bearer(&app.token)
        .json(&json!({
            "accountId": account.id,
            "items": [{ "description": "Diesel", "quantity": 1, "price": 50 }],
        }))
        .await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.json::<Value>()["error"], "storage_error");

    assert_eq!(app.store.commit_count(), commits);
    assert!(app.get_account(&account).await.current_balance.is_zero());
}

// ============================================================================
// Sending
// ============================================================================

#[tokio::test]
async fn test_send_invoice_marks_email_sent() {
    let app = spawn_app();
    let account = app.create_account("Hilltop Farms").await;
    let invoice = app.create_invoice(&account, "75.00", None).await;

    let response = app
        .server
        .post(&format!("/api/v1/invoices/{}/send", invoice.id))
        .authorization_bearer(&app.token)
        .await;
    response.assert_status_ok();
    assert!(response.json::<Invoice>().email_sent);

    let sent = app.dispatcher.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ap@hilltop.test");
    assert!(sent[0].subject.contains(&invoice.id.to_string()));
}

#[tokio::test]
async fn test_failed_send_leaves_flag_unset() {
    let app = spawn_app();
    let account = app.create_account("Hilltop Farms").await;
    let invoice = app.create_invoice(&account, "75.00", None).await;

    app.dispatcher.set_failing(true);
    let response = app
        .server
        .post(&format!("/api/v1/invoices/{}/send", invoice.id))
        .authorization_bearer(&app.token)
        .await;
    response.assert_status(StatusCode::BAD_GATEWAY);

    let stored = app
        .server
        .get(&format!("/api/v1/invoices/{}", invoice.id))
        .authorization_bearer(&app.token)
        .await
        .json::<Invoice>();
    assert!(!stored.email_sent);
}

#[tokio::test]
async fn test_smtp_test_send() {
    let app = spawn_app();
    let response = app
        .server
        .post("/api/v1/settings/test-email")
        .authorization_bearer(&app.token)
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["sent"], true);
    assert_eq!(app.dispatcher.sent().await.len(), 1);

    app.dispatcher.set_failing(true);
    app.server
        .post("/api/v1/settings/test-email")
        .authorization_bearer(&app.token)
        .await
        .assert_status(StatusCode::BAD_GATEWAY);
}

// ============================================================================
// Transactions, receipts and the dashboard
// ============================================================================

#[tokio::test]
async fn test_fuel_and_store_charges_accumulate() {
    let app = spawn_app();
    let account = app.create_account("Hilltop Farms").await;

    for (kind, amount) in [("FUEL", "45.50"), ("STORE", "12.00")] {
        app.server
            .post("/api/v1/transactions")
            .authorization_bearer(&app.token)
            .json(&json!({ "accountId": account.id, "type": kind, "amount": amount }))
            .await
            .assert_status(StatusCode::CREATED);
    }
    assert_eq!(app.get_account(&account).await.current_balance, usd(dec!(57.50)));

    let payment = app
        .server
        .post("/api/v1/transactions")
        .authorization_bearer(&app.token)
        .json(&json!({ "accountId": account.id, "type": "PAYMENT", "amount": 20, "description": "Check 1042" }))
        .await;
    payment.assert_status(StatusCode::CREATED);
    assert_eq!(payment.json::<Transaction>().transaction_type, TransactionType::Payment);
    assert_eq!(app.get_account(&account).await.current_balance, usd(dec!(37.50)));

    let listed = app
        .server
        .get("/api/v1/transactions")
        .add_query_param("accountId", account.id)
        .authorization_bearer(&app.token)
        .await
        .json::<Vec<Transaction>>();
    assert_eq!(listed.len(), 3);
}

#[tokio::test]
async fn test_zero_amount_transaction_is_422() {
    let app = spawn_app();
    let account = app.create_account("Hilltop Farms").await;
    app.server
        .post("/api/v1/transactions")
        .authorization_bearer(&app.token)
        .json(&json!({ "accountId": account.id, "type": "FUEL", "amount": 0 }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert!(app.get_account(&account).await.current_balance.is_zero());
}

#[tokio::test]
async fn test_receipt_intake_records_fuel_charge() {
    let app = spawn_app();
    let account = app.create_account("Hilltop Farms").await;

    let response = app
        .server
        .post("/api/v1/receipts")
        .authorization_bearer(&app.token)
        .json(&json!({
            "accountId": account.id,
            "items": [{ "description": "Regular unleaded", "quantity": 10.5, "price": 3.8 }],
            "totalAmount": 39.9,
            "date": "2025-05-02",
            "storeName": "Ruthton Express",
            "isFuelTransaction": true,
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let transaction = response.json::<Transaction>();
    assert_eq!(transaction.transaction_type, TransactionType::Fuel);
    assert_eq!(transaction.amount, usd(dec!(39.90)));
    assert_eq!(app.get_account(&account).await.current_balance, usd(dec!(39.90)));
}

#[tokio::test]
async fn test_dashboard_totals() {
    let app = spawn_app();
    let account = app.create_account("Hilltop Farms").await;
    app.create_account("Idle Co").await;
    app.create_invoice(&account, "200.00", Some(10)).await;
    app.create_invoice(&account, "50.00", None).await;

    let response = app.server.get("/api/v1/dashboard").authorization_bearer(&app.token).await;
    response.assert_status_ok();
    let stats = response.json::<Value>();
    assert_eq!(stats["overdueCount"], 1);
    assert_eq!(stats["activeAccounts"], 1);
    assert_eq!(stats["totalAccounts"], 2);
    assert_eq!(stats["revenueByMonth"].as_array().map(Vec::len), Some(6));
    assert_eq!(stats["riskAlert"], false);
}

// ============================================================================
// Document backend
// ============================================================================

#[tokio::test]
async fn test_pay_cycle_over_document_store() {
    let store = Arc::new(DocumentLedgerStore::in_memory(DocumentLedgerStore::default_config()));
    let server = server_for(service_over(store.clone()), Arc::new(RecordingDispatcher::new()));
    let admin = token(&[permissions::ADMIN]);

    let account = server
        .post("/api/v1/accounts")
        .authorization_bearer(&admin)
        .json(&json!({ "name": "Hilltop Farms", "email": "ap@hilltop.test" }))
        .await
        .json::<Account>();
    let invoice = server
        .post("/api/v1/invoices")
        .authorization_bearer(&admin)
        .json(&json!({
            "accountId": account.id,
            "items": [{ "description": "Diesel", "quantity": 1, "price": 100 }],
            "taxRate": 0,
        }))
        .await
        .json::<Invoice>();

    server
        .post(&format!("/api/v1/invoices/{}/pay", invoice.id))
        .authorization_bearer(&admin)
        .await
        .assert_status_ok();

    let account = server
        .get(&format!("/api/v1/accounts/{}", account.id))
        .authorization_bearer(&admin)
        .await
        .json::<Account>();
    assert!(account.current_balance.is_zero());
    assert_eq!(store.conflict_count(), 0);
}
