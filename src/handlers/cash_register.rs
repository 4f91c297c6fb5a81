use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};

use crate::auth::capability::{authorize, Capability};
use crate::domain::cash_register::{ensure_can_close, ensure_can_open, validate_balance, STATUS_CLOSED, STATUS_OPEN};
use crate::dtos::cash_register::{
    CashRegisterAction, CashRegisterResponse, ClosedRegisterEnvelope, RegisterEnvelope,
};
use crate::dtos::order::OrderSummary;
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::cash_register::{CashRegister, REGISTER_COLUMNS};
use crate::models::order::{Order, ORDER_COLUMNS};
use crate::state::AppState;

// GET /cash-register - caller's open session, or null
pub async fn get_current(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<RegisterEnvelope>, AppError> {
    authorize(&auth, Capability::Sell)?;

    let register = sqlx::query_as::<_, CashRegister>(&format!(
        "SELECT {REGISTER_COLUMNS} FROM cash_registers WHERE cashier_id = $1 AND status = $2"
    ))
    .bind(auth.user_id)
    .bind(STATUS_OPEN)
    .fetch_optional(&db_pool)
    .await?;

    Ok(Json(RegisterEnvelope { register: register.map(CashRegisterResponse::from) }))
}

// POST /cash-register - {action: "open" | "close"}
pub async fn handle_action(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(action): Json<CashRegisterAction>,
) -> Result<Response, AppError> {
    authorize(&auth, Capability::Sell)?;

    match action {
        CashRegisterAction::Open { opening_balance } => {
            let opening_balance = validate_balance("Opening balance", opening_balance)?;
            let register = open_register(&db_pool, auth.user_id, opening_balance).await?;
            Ok((StatusCode::CREATED, Json(RegisterEnvelope { register: Some(register) })).into_response())
        }
        CashRegisterAction::Close { closing_balance } => {
            let closing_balance = validate_balance("Closing balance", closing_balance)?;
            let closed = close_register(&db_pool, auth.user_id, closing_balance).await?;
            Ok(Json(closed).into_response())
        }
    }
}

async fn open_register(
    db_pool: &sqlx::PgPool,
    cashier_id: i64,
    opening_balance: f64,
) -> Result<CashRegisterResponse, AppError> {
    let mut tx = db_pool.begin().await?;

    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM cash_registers WHERE cashier_id = $1 AND status = $2 FOR UPDATE",
    )
    .bind(cashier_id)
    .bind(STATUS_OPEN)
    .fetch_optional(&mut *tx)
    .await?;
    ensure_can_open(existing)?;

    // The partial unique index catches two opens racing past the check above.
    let register = sqlx::query_as::<_, CashRegister>(&format!(
        r#"INSERT INTO cash_registers (cashier_id, opening_balance, status)
           VALUES ($1, $2::FLOAT8, $3)
           RETURNING {REGISTER_COLUMNS}"#
    ))
    .bind(cashier_id)
    .bind(opening_balance)
    .bind(STATUS_OPEN)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if let Some(db_err) = e.as_database_error() {
            if db_err.code().as_deref() == Some("23505") {
                return AppError::conflict("Cash register is already open for this cashier");
            }
        }
        AppError::db(e)
    })?;

    tx.commit().await?;

    tracing::info!(register_id = register.id, cashier_id, opening_balance, "Cash register opened");
    Ok(CashRegisterResponse::from(register))
}

async fn close_register(
    db_pool: &sqlx::PgPool,
    cashier_id: i64,
    closing_balance: f64,
) -> Result<ClosedRegisterEnvelope, AppError> {
    let mut tx = db_pool.begin().await?;

    // Locking the row makes a concurrent checkout finish its increment first.
    let open = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM cash_registers WHERE cashier_id = $1 AND status = $2 FOR UPDATE",
    )
    .bind(cashier_id)
    .bind(STATUS_OPEN)
    .fetch_optional(&mut *tx)
    .await?;
    let register_id = ensure_can_close(open)?;

    let register = sqlx::query_as::<_, CashRegister>(&format!(
        r#"UPDATE cash_registers
           SET status = $2, closing_balance = $3::FLOAT8, closed_at = now()
           WHERE id = $1
           RETURNING {REGISTER_COLUMNS}"#
    ))
    .bind(register_id)
    .bind(STATUS_CLOSED)
    .bind(closing_balance)
    .fetch_one(&mut *tx)
    .await?;

    let orders = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE cash_register_id = $1 ORDER BY created_at, id"
    ))
    .bind(register_id)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        register_id,
        cashier_id,
        closing_balance,
        total_sales = register.total_sales,
        orders = orders.len(),
        "Cash register closed"
    );

    Ok(ClosedRegisterEnvelope {
        register: CashRegisterResponse::from(register),
        orders: orders.into_iter().map(OrderSummary::from).collect(),
    })
}

// GET /cash-register/history - closed sessions, newest first
pub async fn list_history(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<CashRegisterResponse>>, AppError> {
    authorize(&auth, Capability::Sell)?;
    let all = authorize(&auth, Capability::ViewAllSales).is_ok();

    let registers = sqlx::query_as::<_, CashRegister>(&format!(
        r#"SELECT {REGISTER_COLUMNS} FROM cash_registers
           WHERE status = $1 AND ($2 OR cashier_id = $3)
           ORDER BY closed_at DESC NULLS LAST, id DESC
           LIMIT 200"#
    ))
    .bind(STATUS_CLOSED)
    .bind(all)
    .bind(auth.user_id)
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(registers.into_iter().map(CashRegisterResponse::from).collect()))
}
