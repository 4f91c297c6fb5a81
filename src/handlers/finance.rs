use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use sqlx::PgConnection;

use crate::auth::capability::{authorize, Capability};
use crate::database::{lock_month, lock_month_shared};
use crate::domain::ledger::{self, competency_month, parse_month, MovementKind, RelatedEntity};
use crate::domain::payment::LedgerMethod;
use crate::domain::{from_cents, round_cents, to_cents};
use crate::dtos::finance::{
    ClosureResponse, CreateClosureRequest, MovementListResponse, MovementQuery, MovementResponse,
};
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::finance::{FinancialClosure, FinancialMovement, MOVEMENT_COLUMNS};
use crate::state::AppState;

/// A ledger entry about to be appended.
pub struct NewMovement<'a> {
    pub kind: MovementKind,
    pub amount: f64,
    pub method: LedgerMethod,
    pub related: RelatedEntity,
    pub related_id: i64,
    pub competency_month: &'a str,
    pub created_by: i64,
}

/// Takes the shared month lock and fails with a conflict if the month is closed.
/// Must run on the same transaction as the write it guards.
pub async fn ensure_month_open(conn: &mut PgConnection, month: &str) -> Result<(), AppError> {
    lock_month_shared(&mut *conn, month).await?;

    let closed: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM financial_closures WHERE month = $1)")
            .bind(month)
            .fetch_one(&mut *conn)
            .await?;

    ledger::ensure_month_open(month, closed)?;
    Ok(())
}

pub async fn record_movement(conn: &mut PgConnection, movement: NewMovement<'_>) -> Result<i64, AppError> {
    let id: i64 = sqlx::query_scalar(
        r#"INSERT INTO financial_movements
            (kind, direction, amount, payment_method, related_entity, related_id, competency_month, created_by)
           VALUES ($1, $2, $3::FLOAT8, $4, $5, $6, $7, $8)
           RETURNING id"#,
    )
    .bind(movement.kind.as_str())
    .bind(movement.kind.direction().as_str())
    .bind(round_cents(movement.amount))
    .bind(movement.method.as_str())
    .bind(movement.related.as_str())
    .bind(movement.related_id)
    .bind(movement.competency_month)
    .bind(movement.created_by)
    .fetch_one(&mut *conn)
    .await?;

    tracing::info!(
        movement_id = id,
        kind = movement.kind.as_str(),
        amount = movement.amount,
        month = movement.competency_month,
        "Financial movement recorded"
    );
    Ok(id)
}

// ==================== Closures ====================

pub async fn list_closures(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<ClosureResponse>>, AppError> {
    authorize(&auth, Capability::ManageFinance)?;

    let closures = sqlx::query_as::<_, FinancialClosure>(
        "SELECT month, closed_by, closed_at FROM financial_closures ORDER BY month DESC",
    )
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(closures.into_iter().map(ClosureResponse::from).collect()))
}

pub async fn create_closure(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateClosureRequest>,
) -> Result<(StatusCode, Json<ClosureResponse>), AppError> {
    authorize(&auth, Capability::ManageFinance)?;
    let month = parse_month(&req.month)?;

    let mut tx = db_pool.begin().await?;
    lock_month(&mut *tx, &month).await?;

    let closure = sqlx::query_as::<_, FinancialClosure>(
        r#"INSERT INTO financial_closures (month, closed_by)
           VALUES ($1, $2)
           ON CONFLICT (month) DO NOTHING
           RETURNING month, closed_by, closed_at"#,
    )
    .bind(&month)
    .bind(auth.user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::conflict(format!("Month {month} is already closed")))?;

    tx.commit().await?;

    tracing::info!(%month, closed_by = auth.user_id, "Financial month closed");
    Ok((StatusCode::CREATED, Json(ClosureResponse::from(closure))))
}

pub async fn delete_closure(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(month): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    authorize(&auth, Capability::ManageFinance)?;
    let month = parse_month(&month)?;

    let mut tx = db_pool.begin().await?;
    lock_month(&mut *tx, &month).await?;

    let result = sqlx::query("DELETE FROM financial_closures WHERE month = $1")
        .bind(&month)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("Month {month} is not closed")));
    }
    tx.commit().await?;

    tracing::warn!(%month, reopened_by = auth.user_id, "Financial month reopened");
    Ok(Json(serde_json::json!({ "ok": true })))
}

// ==================== Movements ====================

pub async fn list_movements(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<MovementQuery>,
) -> Result<Json<MovementListResponse>, AppError> {
    authorize(&auth, Capability::ManageFinance)?;

    let month = match query.month {
        Some(m) => parse_month(&m)?,
        None => competency_month(Utc::now()),
    };

    let movements = sqlx::query_as::<_, FinancialMovement>(&format!(
        "SELECT {MOVEMENT_COLUMNS} FROM financial_movements
         WHERE competency_month = $1
         ORDER BY occurred_at ASC, id ASC"
    ))
    .bind(&month)
    .fetch_all(&db_pool)
    .await?;

    let closed: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM financial_closures WHERE month = $1)")
            .bind(&month)
            .fetch_one(&db_pool)
            .await?;

    let (total_in, total_out) = movements.iter().fold((0i64, 0i64), |(i, o), m| {
        if m.direction == "IN" { (i + to_cents(m.amount), o) } else { (i, o + to_cents(m.amount)) }
    });

    Ok(Json(MovementListResponse {
        month,
        closed,
        total_in: from_cents(total_in),
        total_out: from_cents(total_out),
        movements: movements.into_iter().map(MovementResponse::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sqlx::PgPool;

    use super::ensure_month_open;

    async fn close_lock_available(pool: &PgPool, month: &str) -> bool {
        let mut conn = pool.acquire().await.unwrap();
        sqlx::query_scalar("SELECT pg_try_advisory_xact_lock(hashtext('financial_month:' || $1))")
            .bind(month)
            .fetch_one(&mut *conn)
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
    async fn ledger_writers_share_the_month_and_block_closing(pool: PgPool) {
        let month = "2031-01";

        let mut first = pool.begin().await.unwrap();
        ensure_month_open(&mut *first, month).await.unwrap();

        // A second writer in the same month does not wait for the first one to commit.
        let mut second = pool.begin().await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), ensure_month_open(&mut *second, month))
            .await
            .expect("second ledger writer queued behind the first")
            .unwrap();

        assert!(!close_lock_available(&pool, month).await);

        first.rollback().await.unwrap();
        assert!(!close_lock_available(&pool, month).await);
        second.rollback().await.unwrap();
        assert!(close_lock_available(&pool, month).await);
    }
}
