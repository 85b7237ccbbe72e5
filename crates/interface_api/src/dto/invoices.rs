//! Invoice DTOs

use chrono::NaiveDate;
use core_kernel::{AccountId, Money, Rate};
use domain_billing::{InvoiceStatus, LedgerService, NewInvoice};
use domain_billing::BillingError;
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use super::LineItemRequest;

/// Invoice entry form
///
/// Without `amount` the invoice is priced from its items plus tax. A given
/// `amount` is taken as final.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub account_id: AccountId,
    pub date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    #[validate(length(min = 1, message = "at least one item is required"), nested)]
    pub items: Vec<LineItemRequest>,
    /// Tax percentage override, e.g. `7.25`
    pub tax_rate: Option<Decimal>,
    pub amount: Option<Decimal>,
}

impl CreateInvoiceRequest {
    pub fn into_new_invoice(self, service: &LedgerService, today: NaiveDate) -> Result<NewInvoice, BillingError> {
        let currency = service.settings().currency;
        let mut draft = service
            .draft_invoice(self.account_id, self.date.unwrap_or(today))
            .items(self.items.into_iter().map(|item| item.into_line_item(currency)));
        if let Some(due) = self.due_date {
            draft = draft.due_date(due);
        }
        if let Some(percent) = self.tax_rate {
            draft = draft.tax_rate(Rate::from_percentage(percent));
        }

        let mut invoice = draft.build()?;
        if let Some(amount) = self.amount {
            if amount <= Decimal::ZERO {
                return Err(BillingError::validation("Invoice amount must be greater than zero"));
            }
            invoice.amount = Money::new(amount, currency);
            invoice.validate()?;
        }
        Ok(invoice)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: InvoiceStatus,
}
