use sqlx::FromRow;
use chrono::{DateTime, Utc};

#[derive(Debug, FromRow)]
pub struct FinancialClosure {
    pub month: String,
    pub closed_by: Option<i64>,
    pub closed_at: DateTime<Utc>,
}

pub const MOVEMENT_COLUMNS: &str = "id, kind, direction, amount::FLOAT8 AS amount, payment_method,
    related_entity, related_id, occurred_at, competency_month, created_by";

#[derive(Debug, FromRow)]
pub struct FinancialMovement {
    pub id: i64,
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
