//! Receipt intake handler

use axum::{extract::State, http::StatusCode, Json};
use domain_billing::Transaction;

use crate::dto::receipts::ReceiptIntakeRequest;
use crate::dto::today;
use crate::{error::ApiError, AppState};

/// Records a scanned receipt as a FUEL or STORE charge
pub async fn record_receipt(
    State(state): State<AppState>,
    Json(request): Json<ReceiptIntakeRequest>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let transaction = state
        .service
        .record_receipt(request.account_id, request.receipt, today())
        .await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}
