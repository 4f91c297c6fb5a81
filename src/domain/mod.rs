//! Business rules that run without I/O.
//!
//! Handlers read rows inside a transaction, hand them to these functions and
//! write back whatever plan comes out. Keeping the rules here means stock,
//! register and ledger behaviour can be tested without a database.

pub mod bill;
pub mod cash_register;
pub mod checkout;
pub mod ledger;
pub mod payment;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Financial month {0} is closed")]
    MonthClosed(String),
    #[error("Not enough stock for '{product}'{}: requested {requested}, available {available}", size_label(.size))]
    InsufficientStock {
        product: String,
        size: Option<String>,
        requested: i32,
        available: i32,
    },
}

fn size_label(size: &Option<String>) -> String {
    size.as_deref().map(|s| format!(" size {s}")).unwrap_or_default()
}

/// Money is stored as NUMERIC(12,2) and read back as FLOAT8. Sums, comparisons and
/// splits run on integer cents; only the edges convert.
pub fn to_cents(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

pub fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

pub fn round_cents(value: f64) -> f64 {
    from_cents(to_cents(value))
}

/// Two amounts are equal when they agree to the cent.
pub fn same_amount(a: f64, b: f64) -> bool {
    to_cents(a) == to_cents(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_cents() {
        assert_eq!(round_cents(49.9 * 2.0), 99.8);
        assert_eq!(round_cents(0.1 + 0.2), 0.3);
        assert!(same_amount(99.799999, 99.80));
        assert!(!same_amount(99.79, 99.80));
    }

    #[test]
    fn cent_sums_do_not_drift() {
        let cents: i64 = std::iter::repeat(0.1).take(10).map(to_cents).sum();
        assert_eq!(cents, 100);
        assert_eq!(from_cents(cents), 1.0);
        assert_eq!(to_cents(19.99) * 3, 5997);
        assert!(same_amount(0.1 + 0.2, 0.3));
    }

    #[test]
    fn stock_error_names_product_and_size() {
        let err = DomainError::InsufficientStock {
            product: "Denim jacket".into(),
            size: Some("M".into()),
            requested: 4,
            available: 2,
        };
        assert_eq!(
            err.to_string(),
            "Not enough stock for 'Denim jacket' size M: requested 4, available 2"
        );
    }
}
