use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::auth::capability::{authorize, Capability};
use crate::dtos::supplier::{CreateSupplierRequest, SupplierResponse, UpdateSupplierRequest};
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::supplier::Supplier;
use crate::state::AppState;

const SUPPLIER_COLUMNS: &str = "id, name, contact_name, phone, email, notes, created_at";

pub async fn list_suppliers(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<SupplierResponse>>, AppError> {
    authorize(&auth, Capability::ViewCatalog)?;

    let suppliers = sqlx::query_as::<_, Supplier>(&format!(
        "SELECT {SUPPLIER_COLUMNS} FROM suppliers ORDER BY name"
    ))
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(suppliers.into_iter().map(SupplierResponse::from).collect()))
}

pub async fn get_supplier(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<SupplierResponse>, AppError> {
    authorize(&auth, Capability::ViewCatalog)?;

    let supplier = sqlx::query_as::<_, Supplier>(&format!("SELECT {SUPPLIER_COLUMNS} FROM suppliers WHERE id = $1"))
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("Supplier not found"))?;

    Ok(Json(SupplierResponse::from(supplier)))
}

pub async fn create_supplier(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateSupplierRequest>,
) -> Result<(StatusCode, Json<SupplierResponse>), AppError> {
    authorize(&auth, Capability::ManageSuppliers)?;

    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Supplier name is required"));
    }

    let supplier = sqlx::query_as::<_, Supplier>(&format!(
        r#"INSERT INTO suppliers (name, contact_name, phone, email, notes)
           VALUES ($1, $2, $3, $4, $5)
           RETURNING {SUPPLIER_COLUMNS}"#
    ))
    .bind(name)
    .bind(req.contact_name)
    .bind(req.phone)
    .bind(req.email)
    .bind(req.notes)
    .fetch_one(&db_pool)
    .await?;

    Ok((StatusCode::CREATED, Json(SupplierResponse::from(supplier))))
}

pub async fn update_supplier(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateSupplierRequest>,
) -> Result<Json<SupplierResponse>, AppError> {
    authorize(&auth, Capability::ManageSuppliers)?;

    if req.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::validation("Supplier name cannot be empty"));
    }

    let supplier = sqlx::query_as::<_, Supplier>(&format!(
        r#"UPDATE suppliers SET
             name = COALESCE($2, name),
             contact_name = COALESCE($3, contact_name),
             phone = COALESCE($4, phone),
             email = COALESCE($5, email),
             notes = COALESCE($6, notes)
           WHERE id = $1
           RETURNING {SUPPLIER_COLUMNS}"#
    ))
    .bind(id)
    .bind(req.name.map(|n| n.trim().to_string()))
    .bind(req.contact_name)
    .bind(req.phone)
    .bind(req.email)
    .bind(req.notes)
    .fetch_optional(&db_pool)
    .await?
    .ok_or_else(|| AppError::not_found("Supplier not found"))?;

    Ok(Json(SupplierResponse::from(supplier)))
}

pub async fn delete_supplier(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    authorize(&auth, Capability::ManageSuppliers)?;

    let result = sqlx::query("DELETE FROM suppliers WHERE id = $1")
        .bind(id)
        .execute(&db_pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Supplier not found"));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}
