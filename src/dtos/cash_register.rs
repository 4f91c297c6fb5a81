use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::dtos::order::OrderSummary;
use crate::models::cash_register::CashRegister;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum CashRegisterAction {
    Open {
        #[serde(default)]
        opening_balance: f64,
    },
    Close {
        closing_balance: f64,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashRegisterResponse {
    pub id: i64,
    pub cashier_id: i64,
    pub opening_balance: f64,
    pub closing_balance: Option<f64>,
    pub total_sales: f64,
    pub sales_by_method: SalesByMethod,
    pub status: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct SalesByMethod {
    pub cash: f64,
    pub debit: f64,
    pub credit: f64,
    pub pix: f64,
}

impl From<CashRegister> for CashRegisterResponse {
    fn from(r: CashRegister) -> Self {
        Self {
            id: r.id,
            cashier_id: r.cashier_id,
            opening_balance: r.opening_balance,
            closing_balance: r.closing_balance,
            total_sales: r.total_sales,
            sales_by_method: SalesByMethod {
                cash: r.total_cash,
                debit: r.total_debit,
                credit: r.total_credit,
                pix: r.total_pix,
            },
            status: r.status,
            opened_at: r.opened_at,
            closed_at: r.closed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterEnvelope {
    pub register: Option<CashRegisterResponse>,
}

#[derive(Debug, Serialize)]
pub struct ClosedRegisterEnvelope {
    pub register: CashRegisterResponse,
    pub orders: Vec<OrderSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_tagged_actions() {
        let open: CashRegisterAction =
            serde_json::from_value(json!({"action": "open", "openingBalance": 200.0})).unwrap();
        assert!(matches!(open, CashRegisterAction::Open { opening_balance } if opening_balance == 200.0));

        let close: CashRegisterAction =
            serde_json::from_value(json!({"action": "close", "closingBalance": 845.5})).unwrap();
        assert!(matches!(close, CashRegisterAction::Close { closing_balance } if closing_balance == 845.5));
    }

    #[test]
    fn rejects_unknown_action_and_missing_fields() {
        assert!(serde_json::from_value::<CashRegisterAction>(json!({"action": "reopen"})).is_err());
        assert!(serde_json::from_value::<CashRegisterAction>(json!({"action": "close"})).is_err());
    }
}
