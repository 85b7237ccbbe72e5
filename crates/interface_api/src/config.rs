//! API configuration

use std::path::PathBuf;
use std::time::Duration;

use core_kernel::{AdapterConfig, Currency};
use domain_billing::{BillingError, BillingSettings};
use infra_db::{DatabaseConfig, DocumentLedgerStore};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Which ledger store backs the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Document,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// API configuration
///
/// Read from `API_`-prefixed environment variables, e.g. `API_PORT`,
/// `API_STORAGE`, `API_SMTP_HOST`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Log level
    pub log_level: String,
    pub log_format: LogFormat,

    pub storage: StorageBackend,
    /// Database URL (postgres backend)
    pub database_url: String,
    pub database_max_connections: u32,
    /// Seconds a request waits for a pooled connection
    pub database_acquire_timeout_secs: u64,
    /// Snapshot file (document backend); in-memory only when unset
    pub document_path: Option<PathBuf>,
    /// Commit attempts after the first before a batch fails with a conflict
    pub document_max_retries: u32,
    pub document_retry_delay_ms: u64,

    /// SMTP relay; invoice email is disabled when unset
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    /// Use an implicit TLS relay; plain SMTP otherwise (local catchers)
    pub smtp_tls: bool,

    pub station_name: Option<String>,
    pub station_id: Option<String>,
    pub support_email: Option<String>,
    /// Sales tax percentage
    pub tax_rate: Option<Decimal>,
    pub payment_terms_days: Option<u64>,
    pub currency: Option<String>,
    pub risk_overdue_amount: Option<Decimal>,
    pub risk_overdue_count: Option<usize>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let retries = AdapterConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            storage: StorageBackend::Postgres,
            database_url: "postgres://localhost/house_accounts".to_string(),
            database_max_connections: 10,
            database_acquire_timeout_secs: 5,
            document_path: None,
            document_max_retries: retries.max_retries,
            document_retry_delay_ms: retries.retry_delay_ms,
            smtp_host: None,
            smtp_port: 465,
            smtp_username: None,
            smtp_password: None,
            smtp_tls: true,
            station_name: None,
            station_id: None,
            support_email: None,
            tax_rate: None,
            payment_terms_days: None,
            currency: None,
            risk_overdue_amount: None,
            risk_overdue_count: None,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Station settings: defaults with any configured overrides, validated
    pub fn billing_settings(&self) -> Result<BillingSettings, BillingError> {
        let mut settings = BillingSettings::default();
        if let Some(name) = &self.station_name {
            settings.station_name = name.clone();
        }
        if let Some(id) = &self.station_id {
            settings.station_id = id.clone();
        }
        if let Some(email) = &self.support_email {
            settings.support_email = email.clone();
        }
        if let Some(rate) = self.tax_rate {
            settings.tax_rate = rate;
        }
        if let Some(days) = self.payment_terms_days {
            settings.payment_terms_days = days;
        }
        if let Some(code) = &self.currency {
            settings.currency = code
                .parse::<Currency>()
                .map_err(|e| BillingError::validation(e.to_string()))?;
        }
        if let Some(amount) = self.risk_overdue_amount {
            settings.risk_overdue_amount = amount;
        }
        if let Some(count) = self.risk_overdue_count {
            settings.risk_overdue_count = count;
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Pool settings for the postgres backend
    pub fn database(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_url.clone())
            .max_connections(self.database_max_connections)
            .acquire_timeout(Duration::from_secs(self.database_acquire_timeout_secs))
    }

    /// Adapter settings for the document backend
    pub fn document_adapter(&self) -> AdapterConfig {
        DocumentLedgerStore::default_config().with_retries(self.document_max_retries, self.document_retry_delay_ms)
    }
}
