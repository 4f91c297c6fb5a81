use sqlx::FromRow;
use chrono::{DateTime, Utc};

/// Column list for `products` with NUMERIC money cast to FLOAT8.
pub const PRODUCT_COLUMNS: &str = "id, name, sku, owner_id, supplier_id,
    cost_price::FLOAT8 AS cost_price,
    sale_price::FLOAT8 AS sale_price,
    stock, consigned, created_at, updated_at";

#[derive(Debug, FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub sku: String,
    pub owner_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub cost_price: f64,
    pub sale_price: f64,
    pub stock: i32,
    pub consigned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProductSize {
    pub product_id: i64,
    pub size: String,
    pub stock: i32,
}
