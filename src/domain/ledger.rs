//! Competency months, financial closures and movement categories.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::DomainError;

/// `YYYY-MM` of the instant, the key financial closures are stored under.
pub fn competency_month(at: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", at.year(), at.month())
}

/// Accepts only well-formed `YYYY-MM` strings and returns them normalised.
pub fn parse_month(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d")
        .ok()
        .filter(|_| trimmed.len() == 7)
        .map(|d| format!("{:04}-{:02}", d.year(), d.month()))
        .ok_or_else(|| DomainError::Validation(format!("Invalid month '{raw}', expected YYYY-MM")))
}

pub fn ensure_month_open(month: &str, closed: bool) -> Result<(), DomainError> {
    if closed {
        Err(DomainError::MonthClosed(month.to_string()))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Sale,
    ClientPayment,
    BillPayment,
    BillReversal,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Sale => "SALE",
            MovementKind::ClientPayment => "CLIENT_PAYMENT",
            MovementKind::BillPayment => "BILL_PAYMENT",
            MovementKind::BillReversal => "BILL_REVERSAL",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            MovementKind::Sale | MovementKind::ClientPayment | MovementKind::BillReversal => Direction::In,
            MovementKind::BillPayment => Direction::Out,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }
}

/// Which record a movement was booked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelatedEntity {
    Order,
    Bill,
}

impl RelatedEntity {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelatedEntity::Order => "order",
            RelatedEntity::Bill => "bill",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_competency_month() {
        let at = Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 0).unwrap();
        assert_eq!(competency_month(at), "2026-03");
    }

    #[test]
    fn parses_months() {
        assert_eq!(parse_month("2026-10").unwrap(), "2026-10");
        assert_eq!(parse_month(" 2026-01 ").unwrap(), "2026-01");
        assert!(parse_month("2026-13").is_err());
        assert!(parse_month("2026-1").is_err());
        assert!(parse_month("october").is_err());
    }

    #[test]
    fn closed_month_is_a_conflict() {
        assert!(ensure_month_open("2026-09", false).is_ok());
        assert_eq!(
            ensure_month_open("2026-09", true),
            Err(DomainError::MonthClosed("2026-09".into()))
        );
    }

    #[test]
    fn bill_payments_leave_the_till() {
        assert_eq!(MovementKind::BillPayment.direction(), Direction::Out);
        assert_eq!(MovementKind::Sale.direction(), Direction::In);
        assert_eq!(MovementKind::BillReversal.direction(), Direction::In);
    }
}
