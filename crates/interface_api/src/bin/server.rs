//! House Accounts - API Server Binary
//!
//! # Usage
//!
//! ```bash
//! # PostgreSQL backend
//! API_DATABASE_URL=postgres://... cargo run --bin house-accounts-api
//!
//! # Document backend with a snapshot file
//! API_STORAGE=document API_DOCUMENT_PATH=./ledger.json cargo run --bin house-accounts-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` / `API_PORT` - Listen address (default: 0.0.0.0:8080)
//! * `API_JWT_SECRET` - JWT signing secret (required in production)
//! * `API_LOG_LEVEL` / `API_LOG_FORMAT` - Log filter and `pretty` or `json`
//! * `API_STORAGE` - `postgres` (default) or `document`
//! * `API_DATABASE_URL` - PostgreSQL connection string
//! * `API_DOCUMENT_PATH` - Snapshot file for the document backend
//! * `API_SMTP_HOST`, `API_SMTP_PORT`, `API_SMTP_USERNAME`, `API_SMTP_PASSWORD`
//! * `API_STATION_NAME`, `API_SUPPORT_EMAIL`, `API_TAX_RATE`, `API_CURRENCY`, ...

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use domain_billing::{LedgerService, LedgerStore, NotificationDispatch};
use infra_db::{create_pool, run_migrations, DocumentLedgerStore, PostgresLedgerStore};
use interface_api::{
    config::{ApiConfig, LogFormat, StorageBackend},
    create_router,
    mailer::{DisabledDispatcher, SmtpDispatcher},
};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = load_config();
    init_tracing(&config.log_level, config.log_format);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        storage = ?config.storage,
        "Starting House Accounts API Server"
    );

    let settings = config.billing_settings().context("invalid station settings")?;
    let store = open_store(&config).await?;
    let service = LedgerService::new(store, settings.clone());

    let dispatcher: Arc<dyn NotificationDispatch> =
        match SmtpDispatcher::from_config(&config, settings.station_name.clone())
            .context("invalid SMTP settings")?
        {
            Some(smtp) => Arc::new(smtp),
            None => {
                tracing::warn!("No SMTP host configured; invoice email is disabled");
                Arc::new(DisabledDispatcher)
            }
        };

    let app = create_router(service.clone(), dispatcher, config.clone());

    let addr: SocketAddr = config.server_addr().parse().context("invalid listen address")?;
    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.close().await.context("failed to close ledger store")?;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Loads configuration from the environment, falling back to defaults
fn load_config() -> ApiConfig {
    ApiConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Falling back to default configuration: {}", e);
        ApiConfig::default()
    })
}

fn init_tracing(log_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
    }
}

/// Opens the configured ledger store
async fn open_store(config: &ApiConfig) -> anyhow::Result<Arc<dyn LedgerStore>> {
    match config.storage {
        StorageBackend::Postgres => {
            tracing::info!("Connecting to database...");
            let pool = create_pool(config.database())
                .await
                .context("failed to connect to database")?;
            run_migrations(&pool).await.context("failed to run migrations")?;
            tracing::info!("Database ready");
            Ok(Arc::new(PostgresLedgerStore::new(pool)))
        }
        StorageBackend::Document => {
            let store = DocumentLedgerStore::open(config.document_path.clone(), config.document_adapter())
                .await
                .context("failed to open document store")?;
            tracing::info!(path = ?config.document_path, "Document store ready");
            Ok(Arc::new(store))
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
