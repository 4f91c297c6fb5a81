// src/state.rs
use std::sync::Arc;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub auth: Arc<AuthSettings>,
}

/// Token settings shared by the login handler and the auth middleware.
pub struct AuthSettings {
    pub jwt_secret: String,
    pub ttl_hours: i64,
}

impl AppState {
    pub fn new(db_pool: PgPool, jwt_secret: String, ttl_hours: i64) -> Self {
        Self {
            db_pool,
            auth: Arc::new(AuthSettings { jwt_secret, ttl_hours }),
        }
    }
}
