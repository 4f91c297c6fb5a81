use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::models::finance::{FinancialClosure, FinancialMovement};

#[derive(Debug, Deserialize)]
pub struct CreateClosureRequest {
    pub month: String,
}

#[derive(Debug, Deserialize)]
pub struct MovementQuery {
    pub month: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosureResponse {
    pub month: String,
    pub closed_by: Option<i64>,
    pub closed_at: DateTime<Utc>,
}

impl From<FinancialClosure> for ClosureResponse {
    fn from(c: FinancialClosure) -> Self {
        Self { month: c.month, closed_by: c.closed_by, closed_at: c.closed_at }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementResponse {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub direction: String,
    pub amount: f64,
    pub payment_method: String,
    pub related_entity: String,
    pub related_id: i64,
    pub occurred_at: DateTime<Utc>,
    pub competency_month: String,
    pub created_by: Option<i64>,
}

impl From<FinancialMovement> for MovementResponse {
    fn from(m: FinancialMovement) -> Self {
        Self {
            id: m.id,
            kind: m.kind,
            direction: m.direction,
            amount: m.amount,
            payment_method: m.payment_method,
            related_entity: m.related_entity,
            related_id: m.related_id,
            occurred_at: m.occurred_at,
            competency_month: m.competency_month,
            created_by: m.created_by,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementListResponse {
    pub month: String,
    pub closed: bool,
    pub total_in: f64,
    pub total_out: f64,
    pub movements: Vec<MovementResponse>,
}
