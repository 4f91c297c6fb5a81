use chrono::{DateTime, Utc};

#[derive(sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
    pub owner_id: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
