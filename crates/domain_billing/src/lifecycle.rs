//! Invoice lifecycle reads: overdue aging and dashboard statistics
//!
//! Everything here is a pure function of a store snapshot and `today`. It is
//! recomputed per request and never written back.

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

use core_kernel::{Currency, Money};

use crate::account::Account;
use crate::error::BillingError;
use crate::invoice::{Invoice, InvoiceStatus};
use crate::settings::BillingSettings;

/// Number of months shown in the revenue trend
pub const REVENUE_MONTHS: u32 = 6;

/// Number of invoices in the recent list
pub const RECENT_INVOICES: usize = 5;

/// Overdue amount grouped by days past due
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgingBuckets {
    /// 0 to 30 days past due
    pub days_0_30: Money,
    pub days_31_60: Money,
    pub days_61_plus: Money,
}

impl AgingBuckets {
    fn empty(currency: Currency) -> Self {
        Self {
            days_0_30: Money::zero(currency),
            days_31_60: Money::zero(currency),
            days_61_plus: Money::zero(currency),
        }
    }

    fn add(&mut self, days_past_due: i64, amount: &Money) -> Result<(), BillingError> {
        let bucket = match days_past_due {
            d if d <= 30 => &mut self.days_0_30,
            d if d <= 60 => &mut self.days_31_60,
            _ => &mut self.days_61_plus,
        };
        *bucket = bucket.checked_add(amount)?;
        Ok(())
    }
}

/// Overdue subset of the invoice collection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueReport {
    /// Overdue invoices with their derived status
    pub invoices: Vec<Invoice>,
    pub total: Money,
    pub aging: AgingBuckets,
}

impl OverdueReport {
    pub fn count(&self) -> usize {
        self.invoices.len()
    }
}

/// Computes the overdue subset, its total and the aging breakdown
pub fn overdue_report(
    invoices: &[Invoice],
    today: NaiveDate,
    currency: Currency,
) -> Result<OverdueReport, BillingError> {
    let mut overdue = Vec::new();
    let mut total = Money::zero(currency);
    let mut aging = AgingBuckets::empty(currency);

    for invoice in invoices {
        if invoice.classify_status(today) != InvoiceStatus::Overdue {
            continue;
        }
        total = total.checked_add(&invoice.amount)?;
        aging.add(invoice.days_past_due(today), &invoice.amount)?;
        overdue.push(invoice.clone().with_derived_status(today));
    }

    Ok(OverdueReport {
        invoices: overdue,
        total,
        aging,
    })
}

/// Invoiced amount for one calendar month
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRevenue {
    pub year: i32,
    pub month: u32,
    /// Short month name, e.g. `Mar`
    pub label: String,
    pub revenue: Money,
}

/// Headline figures for the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Sum of all account balances
    pub total_receivables: Money,
    pub overdue_amount: Money,
    pub overdue_count: usize,
    /// Accounts carrying a non-zero balance
    pub active_accounts: usize,
    pub total_accounts: usize,
    pub aging: AgingBuckets,
    /// Oldest month first
    pub revenue_by_month: Vec<MonthlyRevenue>,
    pub recent_invoices: Vec<Invoice>,
    pub risk_alert: bool,
}

/// True when collections need attention
pub fn risk_alert(report: &OverdueReport, settings: &BillingSettings) -> bool {
    report.total.amount() > settings.risk_overdue_amount || report.count() > settings.risk_overdue_count
}

pub fn dashboard_stats(
    accounts: &[Account],
    invoices: &[Invoice],
    today: NaiveDate,
    settings: &BillingSettings,
) -> Result<DashboardStats, BillingError> {
    let currency = settings.currency;
    let balances: Vec<Money> = accounts.iter().map(|a| a.current_balance).collect();
    let total_receivables = Money::sum(currency, &balances)?;
    let report = overdue_report(invoices, today, currency)?;

    let mut recent: Vec<Invoice> = invoices.to_vec();
    recent.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
    recent.truncate(RECENT_INVOICES);
    let recent_invoices = recent
        .into_iter()
        .map(|inv| inv.with_derived_status(today))
        .collect();

    Ok(DashboardStats {
        total_receivables,
        overdue_amount: report.total,
        overdue_count: report.count(),
        active_accounts: accounts.iter().filter(|a| !a.current_balance.is_zero()).count(),
        total_accounts: accounts.len(),
        aging: report.aging,
        revenue_by_month: revenue_by_month(invoices, today, currency)?,
        recent_invoices,
        risk_alert: risk_alert(&report, settings),
    })
}

/// Invoiced totals for the current month and the five before it
pub fn revenue_by_month(
    invoices: &[Invoice],
    today: NaiveDate,
    currency: Currency,
) -> Result<Vec<MonthlyRevenue>, BillingError> {
    let first_of_month = today.with_day(1).unwrap_or(today);
    let mut months = Vec::with_capacity(REVENUE_MONTHS as usize);

    for back in (0..REVENUE_MONTHS).rev() {
        let start = first_of_month
            .checked_sub_months(Months::new(back))
            .ok_or_else(|| BillingError::validation("Revenue window out of range"))?;
        let in_month: Vec<Money> = invoices
            .iter()
            .filter(|inv| inv.date.year() == start.year() && inv.date.month() == start.month())
            .map(|inv| inv.amount)
            .collect();

        months.push(MonthlyRevenue {
            year: start.year(),
            month: start.month(),
            label: start.format("%b").to_string(),
            revenue: Money::sum(currency, &in_month)?,
        });
    }

    Ok(months)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use core_kernel::AccountId;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::account::NewAccount;
    use crate::invoice::{InvoiceDraft, LineItem};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 20).unwrap()
    }

    fn invoice(amount: Decimal, date: NaiveDate, due: NaiveDate) -> Invoice {
        let mut inv = InvoiceDraft::new(AccountId::new(), date)
            .due_date(due)
            .item(LineItem::new("Diesel", dec!(1), Money::new(amount, Currency::USD)))
            .build()
            .unwrap()
            .into_invoice();
        inv.amount = Money::new(amount, Currency::USD);
        inv
    }

    fn due_days_ago(amount: Decimal, days: i64) -> Invoice {
        let due = today() - Duration::days(days);
        invoice(amount, due - Duration::days(15), due)
    }

    #[test]
    fn test_aging_scenario() {
        let invoices = vec![due_days_ago(dec!(200), 45), due_days_ago(dec!(200), 5)];
        let report = overdue_report(&invoices, today(), Currency::USD).unwrap();

        assert_eq!(report.count(), 2);
        assert_eq!(report.total.amount(), dec!(400));
        assert_eq!(report.aging.days_0_30.amount(), dec!(200));
        assert_eq!(report.aging.days_31_60.amount(), dec!(200));
        assert!(report.aging.days_61_plus.is_zero());
        assert!(report.invoices.iter().all(|i| i.status == InvoiceStatus::Overdue));
    }

    #[test]
    fn test_bucket_boundaries() {
        let invoices = vec![
            due_days_ago(dec!(1), 30),
            due_days_ago(dec!(10), 31),
            due_days_ago(dec!(100), 60),
            due_days_ago(dec!(1000), 61),
        ];
        let aging = overdue_report(&invoices, today(), Currency::USD).unwrap().aging;
        assert_eq!(aging.days_0_30.amount(), dec!(1));
        assert_eq!(aging.days_31_60.amount(), dec!(110));
        assert_eq!(aging.days_61_plus.amount(), dec!(1000));
    }

    #[test]
    fn test_paid_invoice_leaves_overdue_set() {
        let mut inv = due_days_ago(dec!(75), 10);
        assert_eq!(overdue_report(&[inv.clone()], today(), Currency::USD).unwrap().count(), 1);

        inv.status = InvoiceStatus::Paid;
        assert_eq!(overdue_report(&[inv], today(), Currency::USD).unwrap().count(), 0);
    }

    #[test]
    fn test_risk_alert_thresholds() {
        let settings = BillingSettings::default();

        let small = overdue_report(&[due_days_ago(dec!(100), 3)], today(), Currency::USD).unwrap();
        assert!(!risk_alert(&small, &settings));

        let large = overdue_report(&[due_days_ago(dec!(500.01), 3)], today(), Currency::USD).unwrap();
        assert!(risk_alert(&large, &settings));

        let many: Vec<Invoice> = (0..4).map(|_| due_days_ago(dec!(10), 3)).collect();
        let many = overdue_report(&many, today(), Currency::USD).unwrap();
        assert!(risk_alert(&many, &settings));
    }

    #[test]
    fn test_revenue_window() {
        let invoices = vec![
            invoice(dec!(50), NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(), today()),
            invoice(dec!(25), NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(), today()),
            invoice(dec!(999), NaiveDate::from_ymd_opt(2024, 8, 5).unwrap(), today()),
        ];
        let months = revenue_by_month(&invoices, today(), Currency::USD).unwrap();

        assert_eq!(months.len(), 6);
        assert_eq!((months[0].year, months[0].month), (2025, 3));
        assert_eq!(months[0].label, "Mar");
        assert_eq!(months[0].revenue.amount(), dec!(25));
        assert_eq!(months[5].revenue.amount(), dec!(50));
    }

    #[test]
    fn test_dashboard_stats() {
        let mut owing = NewAccount::new("Acme", "a@acme.test").into_account(Currency::USD, Utc::now());
        owing.current_balance = Money::new(dec!(120), Currency::USD);
        let idle = NewAccount::new("Idle", "i@idle.test").into_account(Currency::USD, Utc::now());

        let invoices: Vec<Invoice> = (1..=7).map(|d| due_days_ago(dec!(10), d)).collect();
        let stats = dashboard_stats(&[owing, idle], &invoices, today(), &BillingSettings::default()).unwrap();

        assert_eq!(stats.total_receivables.amount(), dec!(120));
        assert_eq!(stats.active_accounts, 1);
        assert_eq!(stats.total_accounts, 2);
        assert_eq!(stats.overdue_count, 7);
        assert_eq!(stats.recent_invoices.len(), RECENT_INVOICES);
        assert!(stats.risk_alert);
    }
}
