//! Dashboard handler

use axum::{extract::State, Json};
use domain_billing::DashboardStats;

use crate::dto::today;
use crate::{error::ApiError, AppState};

pub async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardStats>, ApiError> {
    Ok(Json(state.service.dashboard(today()).await?))
}
