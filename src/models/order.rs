use sqlx::FromRow;
use chrono::{DateTime, Utc};

pub const STATUS_PAID: &str = "PAID";
pub const STATUS_PENDING: &str = "PENDING";

pub const ORDER_COLUMNS: &str = "id, cashier_id, cash_register_id, client_id, client_name,
    subtotal::FLOAT8 AS subtotal,
    discount::FLOAT8 AS discount,
    total::FLOAT8 AS total,
    total_cost::FLOAT8 AS total_cost,
    pay_later, status,
    amount_paid::FLOAT8 AS amount_paid,
    amount_remaining::FLOAT8 AS amount_remaining,
    paid_at, created_at";

#[derive(Debug, FromRow)]
pub struct Order {
    pub id: i64,
    pub cashier_id: i64,
    pub cash_register_id: Option<i64>,
    pub client_id: Option<i64>,
    pub client_name: Option<String>,
    pub subtotal: f64,
    pub discount: f64,
    pub total: f64,
    pub total_cost: f64,
    pub pay_later: bool,
    pub status: String,
    pub amount_paid: f64,
    pub amount_remaining: f64,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub size: Option<String>,
    pub quantity: i32,
    pub unit_cost: f64,
    pub unit_price: f64,
}

#[derive(Debug, FromRow)]
pub struct OrderPayment {
    pub order_id: i64,
    pub method: String,
    pub amount: f64,
}
