//! Request handlers

pub mod accounts;
pub mod dashboard;
pub mod health;
pub mod invoices;
pub mod receipts;
pub mod settings;
pub mod transactions;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a path identifier, with or without its display prefix
pub(crate) fn parse_id<T: FromStr>(raw: &str, entity: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {} id: {}", entity, raw)))
}
