//! Transaction DTOs

use chrono::NaiveDate;
use core_kernel::{AccountId, Currency, Money};
use domain_billing::{NewTransaction, TransactionType};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use super::LineItemRequest;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionRequest {
    pub account_id: AccountId,
    pub date: Option<NaiveDate>,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// Unsigned; the type decides whether it charges or credits
    pub amount: Decimal,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub items: Vec<LineItemRequest>,
}

impl CreateTransactionRequest {
    pub fn into_new_transaction(self, currency: Currency, today: NaiveDate) -> NewTransaction {
        let mut request = NewTransaction::new(
            self.account_id,
            self.date.unwrap_or(today),
            self.transaction_type,
            Money::new(self.amount, currency),
        )
        .with_items(self.items.into_iter().map(|item| item.into_line_item(currency)).collect());
        if let Some(description) = self.description {
            request = request.with_description(description);
        }
        request
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    pub account_id: Option<AccountId>,
}
