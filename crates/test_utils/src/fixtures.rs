//! Pre-built Test Fixtures
//!
//! Ready-to-use ledger data with fixed, predictable values.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use core_kernel::{AccountId, Currency, InvoiceId, Money};
use domain_billing::{BillingSettings, LineItem, ScannedItem, ScannedReceipt};
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// The 100.00 invoice used by the pay-cycle scenario
    pub fn usd_100() -> Money {
        Money::new(dec!(100.00), Currency::USD)
    }

    /// A typical fuel charge
    pub fn usd_fuel() -> Money {
        Money::new(dec!(45.50), Currency::USD)
    }

    /// A typical in-store charge
    pub fn usd_store() -> Money {
        Money::new(dec!(12.00), Currency::USD)
    }

    pub fn usd_credit_limit() -> Money {
        Money::new(dec!(2500.00), Currency::USD)
    }

    pub fn usd_zero() -> Money {
        Money::zero(Currency::USD)
    }

    /// A CAD amount for currency mismatch tests
    pub fn cad_100() -> Money {
        Money::new(dec!(100.00), Currency::CAD)
    }
}

/// Fixture for dates and timestamps
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// The fixed "today" used by lifecycle tests (June 30, 2025)
    pub fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
    }

    /// A business date `days` before [`TemporalFixtures::today`]
    pub fn days_ago(days: i64) -> NaiveDate {
        Self::today() - chrono::Duration::days(days)
    }

    /// Account creation timestamp
    pub fn opened_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).unwrap()
    }
}

/// Fixture for identifiers
pub struct IdFixtures;

impl IdFixtures {
    /// A deterministic account ID
    pub fn account_id() -> AccountId {
        AccountId::from_uuid(Uuid::parse_str("018f0000-0000-7000-8000-000000000001").unwrap())
    }

    /// A deterministic invoice ID
    pub fn invoice_id() -> InvoiceId {
        InvoiceId::from_uuid(Uuid::parse_str("018f0000-0000-7000-8000-000000000101").unwrap())
    }

    /// An account ID that is never stored
    pub fn unknown_account_id() -> AccountId {
        AccountId::from_uuid(Uuid::parse_str("018f0000-0000-7000-8000-0000000000ff").unwrap())
    }
}

/// Fixture for string data
pub struct StringFixtures;

impl StringFixtures {
    pub fn account_name() -> &'static str {
        "Lakeside Trucking"
    }

    pub fn account_email() -> &'static str {
        "billing@lakeside-trucking.test"
    }

    pub fn account_phone() -> &'static str {
        "+1-507-555-0142"
    }

    pub fn store_name() -> &'static str {
        "Ruthton Express"
    }
}

/// Fixture for invoice line items
pub struct LineItemFixtures;

impl LineItemFixtures {
    /// 10 gallons of diesel at 3.90
    pub fn diesel() -> LineItem {
        LineItem::new("Diesel", dec!(10), Money::new(dec!(3.90), Currency::USD))
    }

    pub fn wiper_fluid() -> LineItem {
        LineItem::new("Wiper fluid", dec!(2), Money::new(dec!(4.25), Currency::USD))
    }

    /// A single item worth exactly `amount`
    pub fn single(amount: Money) -> LineItem {
        LineItem::new("Account charges", dec!(1), amount)
    }
}

/// Fixture for scanned receipts
pub struct ReceiptFixtures;

impl ReceiptFixtures {
    /// A fuel receipt with a date
    pub fn fuel() -> ScannedReceipt {
        ScannedReceipt {
            items: vec![ScannedItem {
                description: "Unleaded".to_string(),
                quantity: 12.0,
                price: 3.5,
            }],
            total_amount: 42.0,
            date: Some("2025-06-28".to_string()),
            store_name: Some(StringFixtures::store_name().to_string()),
            is_fuel_transaction: true,
        }
    }

    /// An in-store receipt with no date or store
    pub fn store_undated() -> ScannedReceipt {
        ScannedReceipt {
            items: vec![ScannedItem {
                description: "Coffee".to_string(),
                quantity: 2.0,
                price: 2.25,
            }],
            total_amount: 4.5,
            date: None,
            store_name: None,
            is_fuel_transaction: false,
        }
    }
}

/// Fixture for billing settings
pub struct SettingsFixtures;

impl SettingsFixtures {
    pub fn default_settings() -> BillingSettings {
        BillingSettings::default()
    }

    /// Settings with low risk thresholds so a single overdue invoice alerts
    pub fn strict_risk() -> BillingSettings {
        BillingSettings {
            risk_overdue_amount: dec!(50),
            risk_overdue_count: 0,
            ..BillingSettings::default()
        }
    }
}
