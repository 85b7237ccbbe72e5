//! Billing domain errors
//!
//! Ledger operations fail with one of four stable kinds. Validation errors
//! are raised before the store is touched; storage errors are surfaced
//! unchanged after the store has rolled back. Sending an invoice can also
//! fail in the notification dispatcher, which leaves the ledger untouched.

use core_kernel::{MoneyError, PortError};
use serde::Serialize;
use thiserror::Error;

use crate::notification::DispatchError;

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Missing or invalid input fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// A foreign key target does not exist (e.g. unknown account on an invoice)
    #[error("{entity} referenced by id {id} does not exist")]
    Reference { entity: &'static str, id: String },

    /// The operated-on entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The atomic apply failed; nothing was committed
    #[error("Storage error: {0}")]
    Storage(#[source] PortError),

    /// The invoice email could not be delivered; `emailSent` is unchanged
    #[error("Notification error: {0}")]
    Dispatch(#[from] DispatchError),
}

/// Stable classification of a [`BillingError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Reference,
    NotFound,
    Storage,
    Dispatch,
}

impl BillingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BillingError::Validation(message.into())
    }

    pub fn reference(entity: &'static str, id: impl std::fmt::Display) -> Self {
        BillingError::Reference {
            entity,
            id: id.to_string(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        BillingError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BillingError::Validation(_) => ErrorKind::Validation,
            BillingError::Reference { .. } => ErrorKind::Reference,
            BillingError::NotFound { .. } => ErrorKind::NotFound,
            BillingError::Storage(_) => ErrorKind::Storage,
            BillingError::Dispatch(_) => ErrorKind::Dispatch,
        }
    }

    /// True when the caller may safely retry (no partial state was left behind)
    pub fn is_retryable(&self) -> bool {
        matches!(self, BillingError::Storage(e) if e.is_transient())
    }
}

impl From<PortError> for BillingError {
    fn from(error: PortError) -> Self {
        match error {
            PortError::Validation { message } => BillingError::Validation(message),
            other => BillingError::Storage(other),
        }
    }
}

impl From<MoneyError> for BillingError {
    fn from(error: MoneyError) -> Self {
        BillingError::Validation(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(BillingError::validation("name is required").kind(), ErrorKind::Validation);
        assert_eq!(BillingError::reference("Account", "ACC-1").kind(), ErrorKind::Reference);
        assert_eq!(BillingError::not_found("Invoice", "INV-1").kind(), ErrorKind::NotFound);
        assert_eq!(
            BillingError::from(PortError::connection("refused")).kind(),
            ErrorKind::Storage
        );
    }

    #[test]
    fn test_retryable_only_for_transient_storage() {
        assert!(BillingError::from(PortError::conflict("retries exhausted")).is_retryable());
        assert!(!BillingError::from(PortError::duplicate("Invoice", "INV-1")).is_retryable());
        assert!(!BillingError::validation("bad").is_retryable());
    }
}
