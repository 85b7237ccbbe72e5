//! Ports and Adapters Infrastructure
//!
//! Shared error and health types for storage ports. The ledger's storage
//! contract is defined in `domain_billing::store`; its adapters (relational,
//! document, in-memory) all speak [`PortError`] so the service layer can
//! classify failures without knowing which backend produced them.
//!
//! ```text
//!              LedgerService
//!                    │
//!                    ▼
//!          LedgerStore (port trait)
//!            ▲        ▲         ▲
//!   ┌────────┘        │         └────────┐
//!   PostgreSQL    Document CAS      In-memory
//!   (row locks)   (versions)        (tests)
//! ```

use std::fmt;
use thiserror::Error;
use serde::{Deserialize, Serialize};

/// Error type for port operations
#[derive(Debug, Error)]
pub enum PortError {
    /// The requested entity was not found
    #[error("Not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: String,
        id: String,
    },

    /// An insert collided with an existing record
    #[error("Duplicate: {entity_type} with id {id} already exists")]
    Duplicate {
        entity_type: String,
        id: String,
    },

    /// A guarded mutation found the record in an unexpected state
    #[error("Precondition failed: {message}")]
    PreconditionFailed {
        message: String,
    },

    /// Concurrent writers kept invalidating an optimistic commit
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
    },

    /// A record could not be applied because its contents are invalid
    #[error("Validation error: {message}")]
    Validation {
        message: String,
    },

    /// Connection to the underlying system failed
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The operation timed out
    #[error("Timeout after {duration_ms}ms: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
    },

    /// The backing system is unavailable
    #[error("Service unavailable: {service}")]
    ServiceUnavailable {
        service: String,
    },

    /// Stored data could not be encoded or decoded
    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
    },

    /// An internal error occurred
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl PortError {
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub fn duplicate(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::Duplicate {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        PortError::PreconditionFailed {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        PortError::Conflict {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
        }
    }

    /// Creates a Connection error
    pub fn connection(message: impl Into<String>) -> Self {
        PortError::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        PortError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true if this error indicates a transient failure that may succeed on retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PortError::Connection { .. }
                | PortError::Timeout { .. }
                | PortError::ServiceUnavailable { .. }
                | PortError::Conflict { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }

    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, PortError::PreconditionFailed { .. })
    }
}

/// Marker trait for all domain ports
///
/// Ports are shared across request handlers, so they must be thread-safe.
pub trait DomainPort: Send + Sync + 'static {}

/// Configuration shared by storage adapters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Unique identifier for this adapter instance
    pub adapter_id: String,
    pub adapter_type: AdapterType,
    /// Per-operation timeout in milliseconds
    pub timeout_ms: u64,
    /// Maximum retry attempts after an optimistic commit conflict
    pub max_retries: u32,
    /// Retry delay in milliseconds (exponential backoff base)
    pub retry_delay_ms: u64,
}

impl AdapterConfig {
    pub fn new(adapter_id: impl Into<String>, adapter_type: AdapterType) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            adapter_type,
            ..Default::default()
        }
    }

    pub fn with_retries(mut self, max_retries: u32, retry_delay_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_delay_ms = retry_delay_ms;
        self
    }

    /// Backoff before retry number `attempt` (0-based), capped at 2^6 times the base
    pub fn backoff(&self, attempt: u32) -> std::time::Duration {
        let factor = 1u64 << attempt.min(6);
        std::time::Duration::from_millis(self.retry_delay_ms.saturating_mul(factor))
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            adapter_id: "default".to_string(),
            adapter_type: AdapterType::Relational,
            timeout_ms: 30000,
            max_retries: 8,
            retry_delay_ms: 5,
        }
    }
}

/// Type of adapter implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterType {
    /// Relational database adapter (PostgreSQL)
    Relational,
    /// Document store with optimistic transactions
    Document,
    /// In-memory adapter for testing
    Mock,
}

/// Health status for an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterHealth {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

/// Health check result for an adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub adapter_id: String,
    pub status: AdapterHealth,
    /// Latency of the health check in milliseconds
    pub latency_ms: u64,
    /// Optional message with additional details
    pub message: Option<String>,
    pub checked_at: chrono::DateTime<chrono::Utc>,
}

impl HealthCheckResult {
    pub fn healthy(adapter_id: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            status: AdapterHealth::Healthy,
            latency_ms,
            message: None,
            checked_at: chrono::Utc::now(),
        }
    }

    pub fn unhealthy(adapter_id: impl Into<String>, latency_ms: u64, message: impl Into<String>) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            status: AdapterHealth::Unhealthy,
            latency_ms,
            message: Some(message.into()),
            checked_at: chrono::Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == AdapterHealth::Healthy
    }
}

/// Trait for adapters that support health checks
#[async_trait::async_trait]
pub trait HealthCheckable: Send + Sync {
    async fn health_check(&self) -> HealthCheckResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_error_not_found() {
        let error = PortError::not_found("Invoice", "INV-123");
        assert!(error.is_not_found());
        assert!(!error.is_transient());
        assert!(error.to_string().contains("Invoice"));
        assert!(error.to_string().contains("INV-123"));
    }

    #[test]
    fn test_port_error_transient() {
        let timeout = PortError::Timeout {
            operation: "atomic_apply".to_string(),
            duration_ms: 5000,
        };
        assert!(timeout.is_transient());
        assert!(PortError::conflict("retries exhausted").is_transient());
        assert!(PortError::connection("refused").is_transient());

        assert!(!PortError::precondition("invoice already paid").is_transient());
        assert!(!PortError::duplicate("Invoice", "INV-1").is_transient());
    }

    #[test]
    fn test_adapter_config_backoff() {
        let config = AdapterConfig::new("docs", AdapterType::Document).with_retries(5, 10);
        assert_eq!(config.backoff(0).as_millis(), 10);
        assert_eq!(config.backoff(3).as_millis(), 80);
        assert_eq!(config.backoff(20).as_millis(), 640);
    }
}
