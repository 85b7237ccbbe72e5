//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness including the ledger store
///
/// Always answers 200; `database` tells clients whether to show an offline,
/// retryable state.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessResponse {
    pub status: String,
    pub version: String,
    /// `connected` or `unreachable`
    pub database: String,
    pub retryable: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check (includes the ledger store)
pub async fn readiness_check(State(state): State<AppState>) -> Json<ReadinessResponse> {
    let result = state.service.health_check().await;
    let connected = result.is_healthy();

    Json(ReadinessResponse {
        status: if connected { "ready" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if connected { "connected" } else { "unreachable" }.to_string(),
        retryable: !connected,
        latency_ms: result.latency_ms,
        message: result.message,
    })
}
