//! Balance accounting rules
//!
//! Each balance-mutating operation maps to one [`BalanceDelta`]. Deltas are
//! incremental; nothing here recomputes a balance from history.
//!
//! | Operation | Delta |
//! |---|---|
//! | invoice created (A) | `+A` |
//! | invoice UNPAID -> PAID (A) | `-A`, result floored at zero |
//! | FUEL / STORE recorded (A) | `+A` |
//! | PAYMENT recorded (A) | `-A` |

use serde::{Deserialize, Serialize};

use core_kernel::{Money, MoneyError};

use crate::invoice::Invoice;
use crate::transaction::Transaction;

/// A change to an account's running balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDelta {
    pub change: Money,
    /// Clamp the resulting balance at zero instead of going negative
    pub floor_at_zero: bool,
}

impl BalanceDelta {
    pub fn invoice_created(invoice: &Invoice) -> Self {
        Self {
            change: invoice.amount,
            floor_at_zero: false,
        }
    }

    pub fn invoice_paid(invoice: &Invoice) -> Self {
        Self {
            change: -invoice.amount,
            floor_at_zero: true,
        }
    }

    pub fn transaction_recorded(transaction: &Transaction) -> Self {
        Self {
            change: transaction.balance_effect(),
            floor_at_zero: false,
        }
    }

    /// Applies the delta to a balance
    pub fn apply(&self, current: Money) -> Result<Money, MoneyError> {
        let next = current.checked_add(&self.change)?;
        if self.floor_at_zero {
            Ok(next.floor_at_zero())
        } else {
            Ok(next)
        }
    }
}
