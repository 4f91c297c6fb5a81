use sqlx::FromRow;
use chrono::{DateTime, Utc};

pub const CLIENT_COLUMNS: &str =
    "id, name, phone, email, document, balance::FLOAT8 AS balance, created_at";

#[derive(Debug, FromRow)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub document: Option<String>,
    /// Positive means the client owes the shop.
    pub balance: f64,
    pub created_at: DateTime<Utc>,
}
