//! HTTP API Layer
//!
//! REST API for the house-account ledger using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: one module per resource (accounts, invoices, transactions, ...)
//! - **Middleware**: JWT auth with per-route roles, tracing, audit logging
//! - **DTOs**: request bodies with `validator` shape checks
//! - **Mailer**: `lettre` SMTP relay behind the ledger's notification port
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let app = create_router(service, Arc::new(DisabledDispatcher), config);
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod middleware;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use domain_billing::{LedgerService, NotificationDispatch};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{accounts, dashboard, health, invoices, receipts, settings, transactions};
use crate::middleware::{audit_middleware, auth_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: LedgerService,
    pub dispatcher: Arc<dyn NotificationDispatch>,
    pub config: ApiConfig,
}

/// Creates the main API router
///
/// # Arguments
///
/// * `service` - Ledger service over the configured store
/// * `dispatcher` - Outbound email for invoice sends and the SMTP test
/// * `config` - API configuration
pub fn create_router(
    service: LedgerService,
    dispatcher: Arc<dyn NotificationDispatch>,
    config: ApiConfig,
) -> Router {
    let state = AppState {
        service,
        dispatcher,
        config,
    };

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let account_routes = Router::new()
        .route("/", get(accounts::list_accounts).post(accounts::create_account))
        .route("/:id", get(accounts::get_account));

    let invoice_routes = Router::new()
        .route("/", get(invoices::list_invoices).post(invoices::create_invoice))
        .route("/:id", get(invoices::get_invoice))
        .route("/:id/status", put(invoices::update_status))
        .route("/:id/pay", post(invoices::pay_invoice))
        .route("/:id/send", post(invoices::send_invoice));

    let transaction_routes = Router::new().route(
        "/",
        get(transactions::list_transactions).post(transactions::create_transaction),
    );

    let settings_routes = Router::new()
        .route("/", get(settings::get_settings))
        .route("/test-email", post(settings::send_test_email));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/accounts", account_routes)
        .nest("/invoices", invoice_routes)
        .nest("/transactions", transaction_routes)
        .nest("/settings", settings_routes)
        .route("/receipts", post(receipts::record_receipt))
        .route("/dashboard", get(dashboard::dashboard))
        .route("/reports/overdue", get(invoices::overdue_report))
        .layer(axum_middleware::from_fn_with_state(state.clone(), audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .with_state(state)
}
