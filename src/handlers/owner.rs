use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::auth::capability::{authorize, Capability};
use crate::dtos::owner::{CreateOwnerRequest, OwnerResponse, UpdateOwnerRequest};
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::owner::Owner;
use crate::state::AppState;

const OWNER_COLUMNS: &str = "id, name, email, phone, created_at";

pub async fn list_owners(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<OwnerResponse>>, AppError> {
    authorize(&auth, Capability::ManageOwners)?;

    let owners = sqlx::query_as::<_, Owner>(&format!("SELECT {OWNER_COLUMNS} FROM owners ORDER BY name"))
        .fetch_all(&db_pool)
        .await?;

    Ok(Json(owners.into_iter().map(OwnerResponse::from).collect()))
}

// An owner account may read its own record.
pub async fn get_owner(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<OwnerResponse>, AppError> {
    authorize(&auth, Capability::ReadOwned { owner_id: Some(id) })?;

    let owner = sqlx::query_as::<_, Owner>(&format!("SELECT {OWNER_COLUMNS} FROM owners WHERE id = $1"))
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("Owner not found"))?;

    Ok(Json(OwnerResponse::from(owner)))
}

pub async fn create_owner(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateOwnerRequest>,
) -> Result<(StatusCode, Json<OwnerResponse>), AppError> {
    authorize(&auth, Capability::ManageOwners)?;

    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Owner name is required"));
    }

    let owner = sqlx::query_as::<_, Owner>(&format!(
        "INSERT INTO owners (name, email, phone) VALUES ($1, $2, $3) RETURNING {OWNER_COLUMNS}"
    ))
    .bind(name)
    .bind(req.email)
    .bind(req.phone)
    .fetch_one(&db_pool)
    .await?;

    Ok((StatusCode::CREATED, Json(OwnerResponse::from(owner))))
}

pub async fn update_owner(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateOwnerRequest>,
) -> Result<Json<OwnerResponse>, AppError> {
    authorize(&auth, Capability::ManageOwners)?;

    if req.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::validation("Owner name cannot be empty"));
    }

    let owner = sqlx::query_as::<_, Owner>(&format!(
        r#"UPDATE owners SET
             name = COALESCE($2, name),
             email = COALESCE($3, email),
             phone = COALESCE($4, phone)
           WHERE id = $1
           RETURNING {OWNER_COLUMNS}"#
    ))
    .bind(id)
    .bind(req.name.map(|n| n.trim().to_string()))
    .bind(req.email)
    .bind(req.phone)
    .fetch_optional(&db_pool)
    .await?
    .ok_or_else(|| AppError::not_found("Owner not found"))?;

    Ok(Json(OwnerResponse::from(owner)))
}

// Products and owner accounts keep existing; their owner reference is cleared.
pub async fn delete_owner(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    authorize(&auth, Capability::ManageOwners)?;

    let result = sqlx::query("DELETE FROM owners WHERE id = $1")
        .bind(id)
        .execute(&db_pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Owner not found"));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}
