use sqlx::FromRow;
use chrono::{DateTime, Utc};

pub const REGISTER_COLUMNS: &str = "id, cashier_id,
    opening_balance::FLOAT8 AS opening_balance,
    closing_balance::FLOAT8 AS closing_balance,
    total_sales::FLOAT8 AS total_sales,
    total_cash::FLOAT8 AS total_cash,
    total_debit::FLOAT8 AS total_debit,
    total_credit::FLOAT8 AS total_credit,
    total_pix::FLOAT8 AS total_pix,
    status, opened_at, closed_at";

#[derive(Debug, FromRow)]
pub struct CashRegister {
    pub id: i64,
    pub cashier_id: i64,
    pub opening_balance: f64,
    pub closing_balance: Option<f64>,
    pub total_sales: f64,
    pub total_cash: f64,
    pub total_debit: f64,
    pub total_credit: f64,
    pub total_pix: f64,
    pub status: String,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}
