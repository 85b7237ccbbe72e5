//! Account DTOs

use core_kernel::{Currency, Money};
use domain_billing::{Account, CreditUtilization, NewAccount};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    #[validate(length(min = 1, max = 200, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "a valid email is required"))]
    pub email: String,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    pub credit_limit: Option<Decimal>,
}

impl CreateAccountRequest {
    pub fn into_new_account(self, currency: Currency) -> NewAccount {
        let mut request = NewAccount::new(self.name, self.email);
        if let Some(phone) = self.phone.filter(|p| !p.trim().is_empty()) {
            request = request.with_phone(phone);
        }
        if let Some(limit) = self.credit_limit {
            request = request.with_credit_limit(Money::new(limit, currency));
        }
        request
    }
}

/// An account with its advisory credit position
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDetailResponse {
    #[serde(flatten)]
    pub account: Account,
    pub credit: CreditUtilization,
}

impl From<Account> for AccountDetailResponse {
    fn from(account: Account) -> Self {
        let credit = account.credit_utilization();
        Self { account, credit }
    }
}
