//! Notification dispatch port and invoice email rendering
//!
//! The ledger only records `emailSent` once a dispatcher reports success.
//! Dispatch is never retried by the core.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::account::Account;
use crate::invoice::Invoice;
use crate::settings::BillingSettings;

/// Errors from a notification dispatcher
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Sender or recipient could not be used
    #[error("Invalid address: {0}")]
    Address(String),

    /// The relay refused or could not be reached
    #[error("Delivery failed: {0}")]
    Transport(String),

    /// No relay is configured
    #[error("Email delivery is not configured")]
    NotConfigured,
}

/// A rendered outbound email
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: Option<String>,
    pub text_body: Option<String>,
}

impl OutboundEmail {
    /// Invoice email: sent from the support address to the account holder
    pub fn invoice(invoice: &Invoice, account: &Account, settings: &BillingSettings) -> Self {
        Self {
            from: settings.support_email.clone(),
            to: account.email.clone(),
            subject: format!("Invoice {}", invoice.id),
            html_body: Some(render_invoice_html(invoice, settings)),
            text_body: None,
        }
    }

    /// Relay check message sent to the support address itself
    pub fn smtp_test(support_email: &str) -> Self {
        Self {
            from: support_email.to_string(),
            to: support_email.to_string(),
            subject: "SMTP Test".to_string(),
            html_body: None,
            text_body: Some("Working!".to_string()),
        }
    }
}

/// Sends invoice emails on behalf of the ledger
#[async_trait]
pub trait NotificationDispatch: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> Result<(), DispatchError>;

    async fn send_invoice(
        &self,
        invoice: &Invoice,
        account: &Account,
        settings: &BillingSettings,
    ) -> Result<(), DispatchError> {
        self.send(OutboundEmail::invoice(invoice, account, settings)).await
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn format_quantity(quantity: Decimal) -> String {
    quantity.normalize().to_string()
}

/// HTML body: station header, item table and total due
pub fn render_invoice_html(invoice: &Invoice, settings: &BillingSettings) -> String {
    let rows: String = invoice
        .items
        .iter()
        .map(|item| {
            format!(
                concat!(
                    "<tr>",
                    "<td style=\"padding: 12px; border-bottom: 1px solid #eee;\">{}</td>",
                    "<td style=\"padding: 12px; border-bottom: 1px solid #eee; text-align: center;\">{}</td>",
                    "<td style=\"padding: 12px; border-bottom: 1px solid #eee; text-align: right;\">{}</td>",
                    "<td style=\"padding: 12px; border-bottom: 1px solid #eee; text-align: right; font-weight: bold;\">{}</td>",
                    "</tr>"
                ),
                escape_html(&item.description),
                format_quantity(item.quantity),
                item.price,
                item.extended_price()
                    .map(|extended| extended.to_string())
                    .unwrap_or_else(|_| "-".to_string()),
            )
        })
        .collect();

    format!(
        concat!(
            "<div style=\"font-family: sans-serif; color: #334155; max-width: 600px; margin: auto; ",
            "border: 1px solid #e2e8f0; border-radius: 12px; overflow: hidden;\">",
            "<div style=\"background-color: #1e293b; color: white; padding: 32px;\">",
            "<h1 style=\"margin: 0; font-size: 24px;\">{station}</h1>",
            "<p style=\"margin: 4px 0 0; opacity: 0.7; font-size: 14px;\">Invoice: {id}</p>",
            "<p style=\"margin: 4px 0 0; opacity: 0.7; font-size: 14px;\">Due: {due}</p>",
            "</div>",
            "<div style=\"padding: 32px;\">",
            "<table style=\"width: 100%; border-collapse: collapse; margin-bottom: 32px;\">",
            "<thead><tr style=\"background-color: #f8fafc; font-size: 12px;\">",
            "<th style=\"padding: 12px; text-align: left;\">Item</th>",
            "<th style=\"padding: 12px; text-align: center;\">Qty</th>",
            "<th style=\"padding: 12px; text-align: right;\">Price</th>",
            "<th style=\"padding: 12px; text-align: right;\">Total</th>",
            "</tr></thead>",
            "<tbody>{rows}</tbody>",
            "<tfoot><tr>",
            "<td colspan=\"3\" style=\"padding: 24px 12px 12px; text-align: right; font-weight: bold;\">Total Due</td>",
            "<td style=\"padding: 24px 12px 12px; text-align: right; font-size: 20px; font-weight: bold; color: #2563eb;\">{total}</td>",
            "</tr></tfoot>",
            "</table>",
            "</div>",
            "</div>"
        ),
        station = escape_html(&settings.station_name),
        id = invoice.id,
        due = invoice.due_date.format("%b %-d, %Y"),
        rows = rows,
        total = invoice.amount,
    )
}

/// Recording dispatcher for tests
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;

    #[derive(Debug, Default)]
    pub struct RecordingDispatcher {
        sent: Mutex<Vec<OutboundEmail>>,
        fail: AtomicBool,
    }

    impl RecordingDispatcher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes every subsequent send fail with a transport error
        pub fn set_failing(&self, failing: bool) {
            self.fail.store(failing, Ordering::SeqCst);
        }

        pub async fn sent(&self) -> Vec<OutboundEmail> {
            self.sent.lock().await.clone()
        }
    }

    #[async_trait]
    impl NotificationDispatch for RecordingDispatcher {
        async fn send(&self, email: OutboundEmail) -> Result<(), DispatchError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DispatchError::Transport("relay refused connection".to_string()));
            }
            self.sent.lock().await.push(email);
            Ok(())
        }
    }
}
