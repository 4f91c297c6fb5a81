use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::payment::PaymentMethod;
use crate::models::bill::Bill;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBillRequest {
    pub name: String,
    pub amount: f64,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBillRequest {
    pub name: Option<String>,
    pub amount: Option<f64>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct BillListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BillAction {
    MarkPaid {
        method: Option<PaymentMethod>,
    },
    MarkUnpaid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillResponse {
    pub id: i64,
    pub name: String,
    pub amount: f64,
    pub due_date: Option<NaiveDate>,
    pub status: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub paid_method: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Bill> for BillResponse {
    fn from(b: Bill) -> Self {
        Self {
            id: b.id,
            name: b.name,
            amount: b.amount,
            due_date: b.due_date,
            status: b.status,
            paid_at: b.paid_at,
            paid_method: b.paid_method,
            created_at: b.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bill_actions() {
        let paid: BillAction = serde_json::from_value(json!({"action": "mark_paid", "method": "PIX"})).unwrap();
        assert!(matches!(paid, BillAction::MarkPaid { method: Some(PaymentMethod::Pix) }));

        let no_method: BillAction = serde_json::from_value(json!({"action": "mark_paid"})).unwrap();
        assert!(matches!(no_method, BillAction::MarkPaid { method: None }));

        let unpaid: BillAction = serde_json::from_value(json!({"action": "mark_unpaid"})).unwrap();
        assert!(matches!(unpaid, BillAction::MarkUnpaid));
    }
}
