//! Settings handlers

use axum::{extract::State, Json};
use domain_billing::{BillingSettings, OutboundEmail};
use tracing::info;

use crate::dto::settings::TestEmailResponse;
use crate::{error::ApiError, AppState};

/// Current station settings
pub async fn get_settings(State(state): State<AppState>) -> Json<BillingSettings> {
    Json(state.service.settings().clone())
}

/// Sends a test message to the support address through the relay
pub async fn send_test_email(State(state): State<AppState>) -> Result<Json<TestEmailResponse>, ApiError> {
    let to = state.service.settings().support_email.clone();
    state
        .dispatcher
        .send(OutboundEmail::smtp_test(&to))
        .await
        .map_err(|e| ApiError::BadGateway(e.to_string()))?;

    info!(to = %to, "SMTP test email sent");
    Ok(Json(TestEmailResponse { sent: true, to }))
}
