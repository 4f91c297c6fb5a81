//! Cash-register session rules: one open session per cashier, sales bucketed by method.

use super::payment::{LedgerMethod, PaymentAllocation};
use super::{from_cents, round_cents, to_cents, DomainError};

pub const STATUS_OPEN: &str = "OPEN";
pub const STATUS_CLOSED: &str = "CLOSED";

/// Opening requires that the cashier has no session open.
pub fn ensure_can_open(existing_open: Option<i64>) -> Result<(), DomainError> {
    match existing_open {
        Some(id) => Err(DomainError::Conflict(format!(
            "Cash register {id} is already open for this cashier"
        ))),
        None => Ok(()),
    }
}

/// Closing requires an open session and yields its id.
pub fn ensure_can_close(open: Option<i64>) -> Result<i64, DomainError> {
    open.ok_or_else(|| DomainError::Conflict("No open cash register for this cashier".into()))
}

pub fn validate_balance(label: &str, value: f64) -> Result<f64, DomainError> {
    if !value.is_finite() || value < 0.0 {
        return Err(DomainError::Validation(format!("{label} cannot be negative")));
    }
    Ok(round_cents(value))
}

/// Amounts one immediate-payment order adds to the open session.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SalesIncrement {
    pub total: f64,
    pub cash: f64,
    pub debit: f64,
    pub credit: f64,
    pub pix: f64,
}

impl SalesIncrement {
    pub fn from_payments(payments: &[PaymentAllocation]) -> Self {
        // [total, cash, debit, credit, pix] in cents
        let mut cents = [0i64; 5];
        for p in payments {
            let amount = to_cents(p.amount);
            let bucket = match p.method.ledger_method() {
                LedgerMethod::Cash => 1,
                LedgerMethod::Debit => 2,
                LedgerMethod::Credit => 3,
                LedgerMethod::Pix => 4,
            };
            cents[0] += amount;
            cents[bucket] += amount;
        }
        SalesIncrement {
            total: from_cents(cents[0]),
            cash: from_cents(cents[1]),
            debit: from_cents(cents[2]),
            credit: from_cents(cents[3]),
            pix: from_cents(cents[4]),
        }
    }

    pub fn is_empty(&self) -> bool {
        to_cents(self.total) == 0
    }
}
