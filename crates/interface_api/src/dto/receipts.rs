//! Receipt intake DTOs

use core_kernel::AccountId;
use domain_billing::ScannedReceipt;
use serde::Deserialize;

/// Scanner output plus the account to charge
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptIntakeRequest {
    pub account_id: AccountId,
    #[serde(flatten)]
    pub receipt: ScannedReceipt,
}
