//! Invoice handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use core_kernel::InvoiceId;
use domain_billing::{Invoice, OverdueReport, PaidInvoice};
use validator::Validate;

use super::parse_id;
use crate::dto::invoices::*;
use crate::dto::today;
use crate::{error::ApiError, AppState};

/// Lists invoices newest first, items inlined, with derived status
pub async fn list_invoices(State(state): State<AppState>) -> Result<Json<Vec<Invoice>>, ApiError> {
    Ok(Json(state.service.list_invoices(today()).await?))
}

/// Prices and stores an invoice, charging the account
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<Invoice>), ApiError> {
    request.validate()?;
    let invoice = request.into_new_invoice(&state.service, today())?;
    let invoice = state.service.create_invoice(invoice).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Invoice>, ApiError> {
    let invoice_id: InvoiceId = parse_id(&id, "invoice")?;
    Ok(Json(state.service.get_invoice(invoice_id, today()).await?))
}

/// Applies a status change (`PAID` pays the invoice)
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Invoice>, ApiError> {
    let invoice_id: InvoiceId = parse_id(&id, "invoice")?;
    let invoice = state
        .service
        .update_invoice_status(invoice_id, request.status)
        .await?;
    Ok(Json(invoice.with_derived_status(today())))
}

/// Emails the invoice and records `emailSent` on success
pub async fn send_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Invoice>, ApiError> {
    let invoice_id: InvoiceId = parse_id(&id, "invoice")?;
    let invoice = state
        .service
        .send_invoice(invoice_id, state.dispatcher.as_ref())
        .await?;
    Ok(Json(invoice.with_derived_status(today())))
}

/// Overdue invoices with totals and aging buckets
pub async fn overdue_report(State(state): State<AppState>) -> Result<Json<OverdueReport>, ApiError> {
    Ok(Json(state.service.overdue_report(today()).await?))
}

/// Pays an invoice; paying twice is a no-op reported as `newlyPaid: false`
pub async fn pay_invoice(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PaidInvoice>, ApiError> {
    let invoice_id: InvoiceId = parse_id(&id, "invoice")?;
    Ok(Json(state.service.mark_invoice_paid(invoice_id).await?))
}
