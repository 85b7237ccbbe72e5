//! Station billing settings

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, Money, Rate};

use crate::error::BillingError;
use crate::invoice::{DEFAULT_PAYMENT_TERMS_DAYS, DEFAULT_TAX_PERCENT};

/// Typed, validated billing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BillingSettings {
    pub station_name: String,
    pub station_id: String,
    /// Sender address for invoice email
    pub support_email: String,
    /// Sales tax as a percentage, e.g. `7.25`
    pub tax_rate: Decimal,
    pub payment_terms_days: u64,
    pub currency: Currency,
    /// Risk alert fires when the overdue total exceeds this
    pub risk_overdue_amount: Decimal,
    /// Risk alert fires when more invoices than this are overdue
    pub risk_overdue_count: usize,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            station_name: "Ruthton Express".to_string(),
            station_id: "RE-XPRS".to_string(),
            support_email: "billing@ruthtonexpress.com".to_string(),
            tax_rate: DEFAULT_TAX_PERCENT,
            payment_terms_days: DEFAULT_PAYMENT_TERMS_DAYS,
            currency: Currency::USD,
            risk_overdue_amount: dec!(500),
            risk_overdue_count: 3,
        }
    }
}

impl BillingSettings {
    pub fn validate(&self) -> Result<(), BillingError> {
        if self.station_name.trim().is_empty() {
            return Err(BillingError::validation("Station name is required"));
        }
        let email = self.support_email.trim();
        if !email.contains('@') || !email.contains('.') {
            return Err(BillingError::validation(format!("Invalid support email: {}", email)));
        }
        if self.tax_rate < Decimal::ZERO || self.tax_rate > dec!(100) {
            return Err(BillingError::validation("Tax rate must be between 0 and 100 percent"));
        }
        if self.risk_overdue_amount < Decimal::ZERO {
            return Err(BillingError::validation("Risk threshold cannot be negative"));
        }
        Ok(())
    }

    pub fn tax(&self) -> Rate {
        Rate::from_percentage(self.tax_rate)
    }

    pub fn risk_amount_threshold(&self) -> Money {
        Money::new(self.risk_overdue_amount, self.currency)
    }
}
