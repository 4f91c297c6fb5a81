//! Helpers for handler tests that run against a migrated PostgreSQL database
//! (`#[sqlx::test]` hands each test its own).

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;

use crate::auth::jwt::sign_token;
use crate::routes::create_router;
use crate::state::AppState;

const SECRET: &str = "test-secret";

pub fn app(pool: PgPool) -> Router {
    let state = AppState::new(pool, SECRET.into(), 8);
    create_router(&state).with_state(state)
}

/// Inserts an active user with the given role and returns its id and a bearer token.
pub async fn seed_user(pool: &PgPool, role: &str) -> (i64, String) {
    let taken: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(pool).await.unwrap();
    let email = format!("{role}{}@shop.test", taken + 1);
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (email, name, password_hash, role) VALUES ($1, $2, 'unused', $3) RETURNING id",
    )
    .bind(&email)
    .bind(role)
    .bind(role)
    .fetch_one(pool)
    .await
    .unwrap();
    let token = sign_token(id, &email, role, None, SECRET, 8).unwrap();
    (id, token)
}

/// Creates a sized product; the aggregate stock is the sum of the sizes.
pub async fn seed_product(pool: &PgPool, sku: &str, sale_price: f64, sizes: &[(&str, i32)]) -> i64 {
    let stock: i32 = sizes.iter().map(|(_, s)| s).sum();
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO products (name, sku, cost_price, sale_price, stock)
         VALUES ($1, $1, 10, $2::FLOAT8, $3) RETURNING id",
    )
    .bind(sku)
    .bind(sale_price)
    .bind(stock)
    .fetch_one(pool)
    .await
    .unwrap();
    for (size, stock) in sizes {
        sqlx::query("INSERT INTO product_sizes (product_id, size, stock) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(*size)
            .bind(*stock)
            .execute(pool)
            .await
            .unwrap();
    }
    id
}

pub async fn seed_client(pool: &PgPool, name: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO clients (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn client_balance(pool: &PgPool, id: i64) -> f64 {
    sqlx::query_scalar("SELECT balance::FLOAT8 FROM clients WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn movement_count(pool: &PgPool, kind: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM financial_movements WHERE kind = $1")
        .bind(kind)
        .fetch_one(pool)
        .await
        .unwrap()
}

/// Sends one authenticated request and returns the status with the decoded JSON body.
pub async fn send(app: &Router, method: &str, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}
