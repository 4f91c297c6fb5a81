use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::models::owner::Owner;

#[derive(Debug, Deserialize)]
pub struct CreateOwnerRequest {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOwnerRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerResponse {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Owner> for OwnerResponse {
    fn from(o: Owner) -> Self {
        Self { id: o.id, name: o.name, email: o.email, phone: o.phone, created_at: o.created_at }
    }
}
