//! Settings DTOs

use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEmailResponse {
    pub sent: bool,
    pub to: String,
}
