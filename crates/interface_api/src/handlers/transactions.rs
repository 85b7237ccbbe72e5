//! Transaction handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use domain_billing::Transaction;
use validator::Validate;

use crate::dto::today;
use crate::dto::transactions::*;
use crate::{error::ApiError, AppState};

/// Lists transactions newest first, optionally for one account
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    Ok(Json(state.service.list_transactions(query.account_id).await?))
}

/// Records a charge or payment against an account
pub async fn create_transaction(
    State(state): State<AppState>,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    request.validate()?;
    let currency = state.service.settings().currency;
    let transaction = state
        .service
        .record_transaction(request.into_new_transaction(currency, today()))
        .await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}
