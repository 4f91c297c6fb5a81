use sqlx::FromRow;
use chrono::{DateTime, NaiveDate, Utc};

pub const BILL_COLUMNS: &str =
    "id, name, amount::FLOAT8 AS amount, due_date, status, paid_at, paid_method, created_at";

#[derive(Debug, FromRow)]
pub struct Bill {
    pub id: i64,
    pub name: String,
    pub amount: f64,
    pub due_date: Option<NaiveDate>,
    pub status: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub paid_method: Option<String>,
    pub created_at: DateTime<Utc>,
}
