//! API error handling
//!
//! Ledger errors map to HTTP statuses by kind:
//!
//! | Kind | Status |
//! |---|---|
//! | Validation | 422 |
//! | Reference | 409 |
//! | NotFound | 404 |
//! | Storage | 503 |
//! | Dispatch | 502 |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain_billing::BillingError;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String, Option<Vec<String>>),

    /// The ledger store could not complete the request; nothing was written
    #[error("Service unavailable: {message}")]
    Unavailable { message: String, retryable: bool },

    /// The email relay rejected or could not take the message
    #[error("Upstream delivery failed: {0}")]
    BadGateway(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut details = None;
        let mut retryable = None;
        let (status, error_type, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", "Unauthorized".to_string()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "reference_error", msg),
            ApiError::Validation(msg, fields) => {
                details = fields;
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg)
            }
            ApiError::Unavailable { message, retryable: can_retry } => {
                retryable = Some(can_retry);
                (StatusCode::SERVICE_UNAVAILABLE, "storage_error", message)
            }
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "dispatch_error", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
            retryable,
        };

        (status, Json(body)).into_response()
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::Validation(msg) => ApiError::Validation(msg, None),
            e @ BillingError::Reference { .. } => ApiError::Conflict(e.to_string()),
            e @ BillingError::NotFound { .. } => ApiError::NotFound(e.to_string()),
            BillingError::Storage(e) => {
                let retryable = e.is_transient();
                if retryable {
                    warn!(error = %e, "Ledger store unavailable");
                } else {
                    error!(error = %e, "Ledger store failure");
                }
                ApiError::Unavailable {
                    message: e.to_string(),
                    retryable,
                }
            }
            BillingError::Dispatch(e) => ApiError::BadGateway(e.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(message) => format!("{}: {}", field, message),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        details.sort();
        ApiError::Validation("Request validation failed".to_string(), Some(details))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::PortError;

    fn status_of(err: BillingError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_billing_error_status_mapping() {
        assert_eq!(status_of(BillingError::validation("bad")), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_of(BillingError::reference("Account", "ACC-1")), StatusCode::CONFLICT);
        assert_eq!(status_of(BillingError::not_found("Invoice", "INV-1")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(BillingError::Storage(PortError::connection("refused"))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(BillingError::Dispatch(domain_billing::DispatchError::NotConfigured)),
            StatusCode::BAD_GATEWAY
        );
    }
}
