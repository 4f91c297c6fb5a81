use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::Utc;

use crate::auth::capability::{authorize, Capability};
use crate::domain::ledger::{competency_month, MovementKind, RelatedEntity};
use crate::domain::payment::PaymentMethod;
use crate::domain::{round_cents, same_amount};
use crate::dtos::client::{ClientAction, ClientListQuery, ClientResponse, CreateClientRequest, UpdateClientRequest};
use crate::dtos::order::{OrderResponse, OrderSummary};
use crate::error::AppError;
use crate::handlers::finance::{ensure_month_open, record_movement, NewMovement};
use crate::handlers::order::fetch_order_by_id;
use crate::middleware::auth::AuthContext;
use crate::models::client::{Client, CLIENT_COLUMNS};
use crate::models::order::{Order, ORDER_COLUMNS, STATUS_PAID, STATUS_PENDING};
use crate::state::AppState;

pub async fn list_clients(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<ClientListQuery>,
) -> Result<Json<Vec<ClientResponse>>, AppError> {
    authorize(&auth, Capability::ManageClients)?;

    let pattern = params
        .q
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{q}%"));

    let clients = sqlx::query_as::<_, Client>(&format!(
        r#"SELECT {CLIENT_COLUMNS} FROM clients
           WHERE $1::TEXT IS NULL OR name ILIKE $1 OR phone ILIKE $1 OR document ILIKE $1
           ORDER BY name"#
    ))
    .bind(pattern)
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(clients.into_iter().map(ClientResponse::from).collect()))
}

pub async fn get_client(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<ClientResponse>, AppError> {
    authorize(&auth, Capability::ManageClients)?;

    let client = fetch_client(&db_pool, id).await?;
    Ok(Json(ClientResponse::from(client)))
}

pub async fn create_client(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<ClientResponse>), AppError> {
    authorize(&auth, Capability::ManageClients)?;

    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Client name is required"));
    }

    let client = sqlx::query_as::<_, Client>(&format!(
        r#"INSERT INTO clients (name, phone, email, document)
           VALUES ($1, $2, $3, $4)
           RETURNING {CLIENT_COLUMNS}"#
    ))
    .bind(name)
    .bind(req.phone)
    .bind(req.email)
    .bind(req.document)
    .fetch_one(&db_pool)
    .await?;

    Ok((StatusCode::CREATED, Json(ClientResponse::from(client))))
}

pub async fn update_client(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateClientRequest>,
) -> Result<Json<ClientResponse>, AppError> {
    authorize(&auth, Capability::ManageClients)?;

    if req.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::validation("Client name cannot be empty"));
    }

    // Balance only moves through sales, settlements and adjustments.
    let client = sqlx::query_as::<_, Client>(&format!(
        r#"UPDATE clients SET
             name = COALESCE($1, name),
             phone = COALESCE($2, phone),
             email = COALESCE($3, email),
             document = COALESCE($4, document)
           WHERE id = $5
           RETURNING {CLIENT_COLUMNS}"#
    ))
    .bind(req.name.map(|n| n.trim().to_string()))
    .bind(req.phone)
    .bind(req.email)
    .bind(req.document)
    .bind(id)
    .fetch_optional(&db_pool)
    .await?
    .ok_or_else(|| AppError::not_found("Client not found"))?;

    Ok(Json(ClientResponse::from(client)))
}

pub async fn delete_client(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    authorize(&auth, Capability::RemoveClients)?;

    let mut tx = db_pool.begin().await?;

    let balance = sqlx::query_scalar::<_, f64>("SELECT balance::FLOAT8 FROM clients WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Client not found"))?;

    if !same_amount(balance, 0.0) {
        return Err(AppError::conflict(format!(
            "Client still has an open balance of {balance:.2}"
        )));
    }

    sqlx::query("DELETE FROM clients WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.code().as_deref() == Some("23503") {
                    return AppError::conflict("Client has orders and cannot be deleted");
                }
            }
            AppError::db(e)
        })?;

    tx.commit().await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// GET /clients/:id/orders - deferred orders still awaiting payment
pub async fn list_pending_orders(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<OrderSummary>>, AppError> {
    authorize(&auth, Capability::ManageClients)?;
    fetch_client(&db_pool, id).await?;

    let orders = sqlx::query_as::<_, Order>(&format!(
        r#"SELECT {ORDER_COLUMNS} FROM orders
           WHERE client_id = $1 AND pay_later AND status = $2
           ORDER BY created_at"#
    ))
    .bind(id)
    .bind(STATUS_PENDING)
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(orders.into_iter().map(OrderSummary::from).collect()))
}

// PATCH /clients/:id - {action: "pay_order" | "adjust_balance"}
pub async fn handle_action(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(action): Json<ClientAction>,
) -> Result<Response, AppError> {
    match action {
        ClientAction::PayOrder { order_id, method } => {
            authorize(&auth, Capability::ManageClients)?;
            let order = settle_order(&db_pool, &auth, id, order_id, method.unwrap_or(PaymentMethod::Cash)).await?;
            Ok(Json(order).into_response())
        }
        ClientAction::AdjustBalance { amount } => {
            authorize(&auth, Capability::AdjustClientBalance)?;
            let client = adjust_balance(&db_pool, id, amount).await?;
            Ok(Json(ClientResponse::from(client)).into_response())
        }
    }
}

/// Marks one pending deferred order as paid and takes its total off the client's balance.
///
/// The status flip is a compare-and-set on `status = 'PENDING'`, so a second
/// settlement of the same order finds nothing to update and the balance moves once.
async fn settle_order(
    db_pool: &sqlx::PgPool,
    auth: &AuthContext,
    client_id: i64,
    order_id: i64,
    method: PaymentMethod,
) -> Result<OrderResponse, AppError> {
    let mut tx = db_pool.begin().await?;

    let total = sqlx::query_scalar::<_, f64>(
        r#"UPDATE orders
           SET status = $3, amount_paid = total, amount_remaining = 0, paid_at = now()
           WHERE id = $1 AND client_id = $2 AND pay_later AND status = $4
           RETURNING total::FLOAT8"#,
    )
    .bind(order_id)
    .bind(client_id)
    .bind(STATUS_PAID)
    .bind(STATUS_PENDING)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::not_found("Pending order not found for this client"))?;

    sqlx::query("UPDATE clients SET balance = balance - $2::FLOAT8 WHERE id = $1")
        .bind(client_id)
        .bind(total)
        .execute(&mut *tx)
        .await?;

    if total > 0.0 {
        let month = competency_month(Utc::now());
        ensure_month_open(&mut *tx, &month).await?;
        record_movement(
            &mut *tx,
            NewMovement {
                kind: MovementKind::ClientPayment,
                amount: total,
                method: method.ledger_method(),
                related: RelatedEntity::Order,
                related_id: order_id,
                competency_month: &month,
                created_by: auth.user_id,
            },
        )
        .await?;
    }

    tx.commit().await?;

    tracing::info!(client_id, order_id, total, method = %method, "Deferred order settled");
    fetch_order_by_id(db_pool, order_id).await
}

async fn adjust_balance(db_pool: &sqlx::PgPool, client_id: i64, amount: f64) -> Result<Client, AppError> {
    if !amount.is_finite() || same_amount(amount, 0.0) {
        return Err(AppError::validation("Adjustment amount must be a non-zero number"));
    }

    let client = sqlx::query_as::<_, Client>(&format!(
        "UPDATE clients SET balance = balance + $2::FLOAT8 WHERE id = $1 RETURNING {CLIENT_COLUMNS}"
    ))
    .bind(client_id)
    .bind(round_cents(amount))
    .fetch_optional(db_pool)
    .await?
    .ok_or_else(|| AppError::not_found("Client not found"))?;

    tracing::info!(client_id, amount, balance = client.balance, "Client balance adjusted");
    Ok(client)
}

async fn fetch_client(db_pool: &sqlx::PgPool, id: i64) -> Result<Client, AppError> {
    sqlx::query_as::<_, Client>(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1"))
        .bind(id)
        .fetch_optional(db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("Client not found"))
}
