//! Bill status transitions (PENDING <-> PAID) and the month guards around them.

use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ledger::competency_month;
use super::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillStatus {
    Pending,
    Paid,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Pending => "PENDING",
            BillStatus::Paid => "PAID",
        }
    }
}

impl FromStr for BillStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BillStatus::Pending),
            "PAID" => Ok(BillStatus::Paid),
            other => Err(DomainError::Validation(format!("Unknown bill status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkPaid {
    /// Bill is already paid; nothing is written.
    AlreadyPaid,
    Pay { record_movement: bool },
}

pub fn plan_mark_paid(status: BillStatus, amount: f64) -> MarkPaid {
    match status {
        BillStatus::Paid => MarkPaid::AlreadyPaid,
        BillStatus::Pending => MarkPaid::Pay { record_movement: amount > 0.0 },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkUnpaid {
    AlreadyPending,
    Revert {
        /// Month the payment was booked in; must still be open. `None` when no paid
        /// timestamp was recorded, in which case no guard applies.
        paid_month: Option<String>,
        reverse_movement: bool,
    },
}

pub fn plan_mark_unpaid(status: BillStatus, paid_at: Option<DateTime<Utc>>, amount: f64) -> MarkUnpaid {
    match status {
        BillStatus::Pending => MarkUnpaid::AlreadyPending,
        BillStatus::Paid => {
            let paid_month = paid_at.map(competency_month);
            MarkUnpaid::Revert {
                reverse_movement: paid_month.is_some() && amount > 0.0,
                paid_month,
            }
        }
    }
}

/// Deleting a paid bill undoes its payment, so the same guard as a revert applies.
pub fn plan_delete(status: BillStatus, paid_at: Option<DateTime<Utc>>, amount: f64) -> MarkUnpaid {
    plan_mark_unpaid(status, paid_at, amount)
}

pub fn ensure_editable(status: BillStatus) -> Result<(), DomainError> {
    match status {
        BillStatus::Pending => Ok(()),
        BillStatus::Paid => Err(DomainError::Conflict("Paid bills cannot be edited; mark it unpaid first".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn paying_twice_is_a_no_op() {
        assert_eq!(plan_mark_paid(BillStatus::Pending, 120.0), MarkPaid::Pay { record_movement: true });
        assert_eq!(plan_mark_paid(BillStatus::Paid, 120.0), MarkPaid::AlreadyPaid);
    }

    #[test]
    fn zero_amount_bill_records_no_movement() {
        assert_eq!(plan_mark_paid(BillStatus::Pending, 0.0), MarkPaid::Pay { record_movement: false });
    }

    #[test]
    fn revert_is_guarded_by_paid_month() {
        let paid_at = Utc.with_ymd_and_hms(2026, 8, 14, 10, 0, 0).unwrap();
        assert_eq!(
            plan_mark_unpaid(BillStatus::Paid, Some(paid_at), 80.0),
            MarkUnpaid::Revert { paid_month: Some("2026-08".into()), reverse_movement: true }
        );
    }

    #[test]
    fn revert_without_paid_timestamp_skips_guard() {
        assert_eq!(
            plan_mark_unpaid(BillStatus::Paid, None, 80.0),
            MarkUnpaid::Revert { paid_month: None, reverse_movement: false }
        );
        assert_eq!(plan_delete(BillStatus::Pending, None, 80.0), MarkUnpaid::AlreadyPending);
    }

    #[test]
    fn only_pending_bills_are_editable() {
        assert!(ensure_editable(BillStatus::Pending).is_ok());
        assert!(matches!(ensure_editable(BillStatus::Paid), Err(DomainError::Conflict(_))));
    }
}
