use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

use super::{from_cents, round_cents, to_cents, DomainError};

/// How a customer paid at the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    CardDebit,
    CardCredit,
    Pix,
}

/// Ledger category a payment method is booked under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerMethod {
    Cash,
    Debit,
    Credit,
    Pix,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::CardDebit => "CARD_DEBIT",
            PaymentMethod::CardCredit => "CARD_CREDIT",
            PaymentMethod::Pix => "PIX",
        }
    }

    pub fn ledger_method(&self) -> LedgerMethod {
        match self {
            PaymentMethod::Cash => LedgerMethod::Cash,
            PaymentMethod::CardDebit => LedgerMethod::Debit,
            PaymentMethod::CardCredit => LedgerMethod::Credit,
            PaymentMethod::Pix => LedgerMethod::Pix,
        }
    }
}

impl LedgerMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerMethod::Cash => "cash",
            LedgerMethod::Debit => "debit",
            LedgerMethod::Credit => "credit",
            LedgerMethod::Pix => "pix",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CASH" => Ok(PaymentMethod::Cash),
            "CARD_DEBIT" => Ok(PaymentMethod::CardDebit),
            "CARD_CREDIT" => Ok(PaymentMethod::CardCredit),
            "PIX" => Ok(PaymentMethod::Pix),
            other => Err(DomainError::Validation(format!("Unknown payment method '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentAllocation {
    pub method: PaymentMethod,
    pub amount: f64,
}

/// Resolves the payment allocations stored on an order.
///
/// Deferred orders carry none. Immediate orders without explicit allocations
/// are treated as paid in cash; explicit allocations must cover the total exactly.
pub fn allocate_payments(
    total: f64,
    requested: Option<Vec<PaymentAllocation>>,
    pay_later: bool,
) -> Result<Vec<PaymentAllocation>, DomainError> {
    if pay_later {
        return Ok(Vec::new());
    }

    let payments = match requested {
        Some(p) if !p.is_empty() => p,
        _ => {
            return Ok(vec![PaymentAllocation {
                method: PaymentMethod::Cash,
                amount: round_cents(total),
            }])
        }
    };

    if payments.iter().any(|p| !p.amount.is_finite() || p.amount < 0.0) {
        return Err(DomainError::Validation("Payment amounts cannot be negative".into()));
    }

    let paid = payments.iter().fold(0i64, |acc, p| acc.saturating_add(to_cents(p.amount)));
    let due = to_cents(total);
    if paid != due {
        return Err(DomainError::Validation(format!(
            "Payments ({:.2}) must equal the order total ({:.2})",
            from_cents(paid),
            from_cents(due)
        )));
    }

    Ok(payments
        .into_iter()
        .filter(|p| to_cents(p.amount) > 0)
        .map(|p| PaymentAllocation { method: p.method, amount: round_cents(p.amount) })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_methods_to_ledger_categories() {
        assert_eq!(PaymentMethod::Cash.ledger_method().as_str(), "cash");
        assert_eq!(PaymentMethod::CardDebit.ledger_method().as_str(), "debit");
        assert_eq!(PaymentMethod::CardCredit.ledger_method().as_str(), "credit");
        assert_eq!(PaymentMethod::Pix.ledger_method().as_str(), "pix");
    }

    #[test]
    fn parses_stored_method_names() {
        assert_eq!("CARD_CREDIT".parse::<PaymentMethod>().unwrap(), PaymentMethod::CardCredit);
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn deferred_orders_have_no_allocations() {
        let payments = allocate_payments(
            100.0,
            Some(vec![PaymentAllocation { method: PaymentMethod::Pix, amount: 100.0 }]),
            true,
        )
        .unwrap();
        assert!(payments.is_empty());
    }

    #[test]
    fn missing_allocations_default_to_cash() {
        let payments = allocate_payments(99.8, None, false).unwrap();
        assert_eq!(payments, vec![PaymentAllocation { method: PaymentMethod::Cash, amount: 99.8 }]);
    }

    #[test]
    fn split_payment_must_cover_total() {
        let split = vec![
            PaymentAllocation { method: PaymentMethod::Cash, amount: 50.0 },
            PaymentAllocation { method: PaymentMethod::CardDebit, amount: 49.8 },
        ];
        assert_eq!(allocate_payments(99.8, Some(split.clone()), false).unwrap().len(), 2);

        let short = vec![PaymentAllocation { method: PaymentMethod::Cash, amount: 50.0 }];
        assert!(matches!(
            allocate_payments(99.8, Some(short), false),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn split_is_compared_in_cents() {
        let split = vec![
            PaymentAllocation { method: PaymentMethod::Cash, amount: 0.1 },
            PaymentAllocation { method: PaymentMethod::Pix, amount: 0.2 },
        ];
        assert_eq!(allocate_payments(0.3, Some(split), false).unwrap().len(), 2);

        let off_by_a_cent = vec![PaymentAllocation { method: PaymentMethod::Cash, amount: 0.29 }];
        assert!(allocate_payments(0.3, Some(off_by_a_cent), false).is_err());
    }

    #[test]
    fn negative_allocation_is_rejected() {
        let bad = vec![
            PaymentAllocation { method: PaymentMethod::Cash, amount: 120.0 },
            PaymentAllocation { method: PaymentMethod::Pix, amount: -20.0 },
        ];
        assert!(allocate_payments(100.0, Some(bad), false).is_err());
    }
}
