//! Account handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use core_kernel::AccountId;
use domain_billing::Account;
use validator::Validate;

use super::parse_id;
use crate::dto::accounts::*;
use crate::{error::ApiError, AppState};

/// Lists accounts ordered by name
pub async fn list_accounts(State(state): State<AppState>) -> Result<Json<Vec<Account>>, ApiError> {
    Ok(Json(state.service.list_accounts().await?))
}

/// Opens an account with a zero balance
pub async fn create_account(
    State(state): State<AppState>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    request.validate()?;
    let currency = state.service.settings().currency;
    let account = state
        .service
        .create_account(request.into_new_account(currency))
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// Gets an account with its credit utilization
pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AccountDetailResponse>, ApiError> {
    let account_id: AccountId = parse_id(&id, "account")?;
    let account = state.service.get_account(account_id).await?;
    Ok(Json(account.into()))
}
