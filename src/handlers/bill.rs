use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use sqlx::PgConnection;

use crate::auth::capability::{authorize, Capability};
use crate::domain::bill::{
    ensure_editable, plan_delete, plan_mark_paid, plan_mark_unpaid, BillStatus, MarkPaid, MarkUnpaid,
};
use crate::domain::ledger::{competency_month, MovementKind, RelatedEntity};
use crate::domain::payment::{LedgerMethod, PaymentMethod};
use crate::domain::round_cents;
use crate::dtos::bill::{BillAction, BillListQuery, BillResponse, CreateBillRequest, UpdateBillRequest};
use crate::error::AppError;
use crate::handlers::finance::{ensure_month_open, record_movement, NewMovement};
use crate::middleware::auth::AuthContext;
use crate::models::bill::{Bill, BILL_COLUMNS};
use crate::state::AppState;

pub async fn list_bills(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<BillListQuery>,
) -> Result<Json<Vec<BillResponse>>, AppError> {
    authorize(&auth, Capability::ManageBills)?;

    let status = params
        .status
        .map(|s| s.to_uppercase().parse::<BillStatus>())
        .transpose()?;

    let bills = sqlx::query_as::<_, Bill>(&format!(
        r#"SELECT {BILL_COLUMNS} FROM bills
           WHERE $1::TEXT IS NULL OR status = $1
           ORDER BY due_date ASC NULLS LAST, id DESC"#
    ))
    .bind(status.map(|s| s.as_str()))
    .fetch_all(&db_pool)
    .await?;

    Ok(Json(bills.into_iter().map(BillResponse::from).collect()))
}

pub async fn get_bill(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<BillResponse>, AppError> {
    authorize(&auth, Capability::ManageBills)?;

    let bill = sqlx::query_as::<_, Bill>(&format!("SELECT {BILL_COLUMNS} FROM bills WHERE id = $1"))
        .bind(id)
        .fetch_optional(&db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("Bill not found"))?;

    Ok(Json(BillResponse::from(bill)))
}

pub async fn create_bill(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateBillRequest>,
) -> Result<(StatusCode, Json<BillResponse>), AppError> {
    authorize(&auth, Capability::ManageBills)?;

    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Bill name is required"));
    }
    validate_amount(req.amount)?;

    let bill = sqlx::query_as::<_, Bill>(&format!(
        r#"INSERT INTO bills (name, amount, due_date)
           VALUES ($1, $2::FLOAT8, $3)
           RETURNING {BILL_COLUMNS}"#
    ))
    .bind(name)
    .bind(round_cents(req.amount))
    .bind(req.due_date)
    .fetch_one(&db_pool)
    .await?;

    Ok((StatusCode::CREATED, Json(BillResponse::from(bill))))
}

pub async fn update_bill(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateBillRequest>,
) -> Result<Json<BillResponse>, AppError> {
    authorize(&auth, Capability::ManageBills)?;

    if req.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::validation("Bill name cannot be empty"));
    }
    if let Some(amount) = req.amount {
        validate_amount(amount)?;
    }

    let mut tx = db_pool.begin().await?;
    let bill = lock_bill(&mut *tx, id).await?;
    ensure_editable(bill_status(&bill)?)?;

    let bill = sqlx::query_as::<_, Bill>(&format!(
        r#"UPDATE bills SET
             name = COALESCE($2, name),
             amount = COALESCE($3::FLOAT8, amount),
             due_date = COALESCE($4, due_date)
           WHERE id = $1
           RETURNING {BILL_COLUMNS}"#
    ))
    .bind(id)
    .bind(req.name.map(|n| n.trim().to_string()))
    .bind(req.amount.map(round_cents))
    .bind(req.due_date)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Json(BillResponse::from(bill)))
}

// PATCH /bills/:id - {action: "mark_paid" | "mark_unpaid"}
pub async fn handle_action(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
    Json(action): Json<BillAction>,
) -> Result<Json<BillResponse>, AppError> {
    authorize(&auth, Capability::ManageBills)?;

    let bill = match action {
        BillAction::MarkPaid { method } => {
            mark_paid(&db_pool, &auth, id, method.unwrap_or(PaymentMethod::Cash)).await?
        }
        BillAction::MarkUnpaid => mark_unpaid(&db_pool, &auth, id).await?,
    };

    Ok(Json(BillResponse::from(bill)))
}

async fn mark_paid(
    db_pool: &sqlx::PgPool,
    auth: &AuthContext,
    id: i64,
    method: PaymentMethod,
) -> Result<Bill, AppError> {
    let month = competency_month(Utc::now());

    let mut tx = db_pool.begin().await?;

    // Row lock first, month lock last: the same order every ledger write uses.
    let bill = lock_bill(&mut *tx, id).await?;
    let record_movement_needed = match plan_mark_paid(bill_status(&bill)?, bill.amount) {
        MarkPaid::AlreadyPaid => {
            tracing::debug!(bill_id = id, "Bill already paid; nothing to do");
            return Ok(bill);
        }
        MarkPaid::Pay { record_movement } => record_movement,
    };
    ensure_month_open(&mut *tx, &month).await?;

    let bill = sqlx::query_as::<_, Bill>(&format!(
        r#"UPDATE bills SET status = $2, paid_at = now(), paid_method = $3
           WHERE id = $1
           RETURNING {BILL_COLUMNS}"#
    ))
    .bind(id)
    .bind(BillStatus::Paid.as_str())
    .bind(method.as_str())
    .fetch_one(&mut *tx)
    .await?;

    if record_movement_needed {
        record_movement(
            &mut *tx,
            NewMovement {
                kind: MovementKind::BillPayment,
                amount: bill.amount,
                method: method.ledger_method(),
                related: RelatedEntity::Bill,
                related_id: bill.id,
                competency_month: &month,
                created_by: auth.user_id,
            },
        )
        .await?;
    }

    tx.commit().await?;

    tracing::info!(bill_id = id, amount = bill.amount, method = %method, %month, "Bill marked paid");
    Ok(bill)
}

async fn mark_unpaid(db_pool: &sqlx::PgPool, auth: &AuthContext, id: i64) -> Result<Bill, AppError> {
    let mut tx = db_pool.begin().await?;

    let bill = lock_bill(&mut *tx, id).await?;
    let plan = plan_mark_unpaid(bill_status(&bill)?, bill.paid_at, bill.amount);
    if plan == MarkUnpaid::AlreadyPending {
        return Ok(bill);
    }
    undo_payment(&mut *tx, auth, &bill, plan).await?;

    let bill = sqlx::query_as::<_, Bill>(&format!(
        r#"UPDATE bills SET status = $2, paid_at = NULL, paid_method = NULL
           WHERE id = $1
           RETURNING {BILL_COLUMNS}"#
    ))
    .bind(id)
    .bind(BillStatus::Pending.as_str())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(bill_id = id, "Bill reverted to pending");
    Ok(bill)
}

pub async fn delete_bill(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    authorize(&auth, Capability::ManageBills)?;

    let mut tx = db_pool.begin().await?;

    let bill = lock_bill(&mut *tx, id).await?;
    let plan = plan_delete(bill_status(&bill)?, bill.paid_at, bill.amount);
    undo_payment(&mut *tx, &auth, &bill, plan).await?;

    sqlx::query("DELETE FROM bills WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(bill_id = id, "Bill deleted");
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Guards the month the bill was paid in and books the reversing movement.
/// The month lock is held until the surrounding transaction ends, so a closure
/// cannot slip in between this check and the bill update.
async fn undo_payment(
    conn: &mut PgConnection,
    auth: &AuthContext,
    bill: &Bill,
    plan: MarkUnpaid,
) -> Result<(), AppError> {
    let MarkUnpaid::Revert { paid_month, reverse_movement } = plan else {
        return Ok(());
    };
    let Some(paid_month) = paid_month else {
        return Ok(());
    };

    ensure_month_open(&mut *conn, &paid_month).await?;

    if reverse_movement {
        let method = bill
            .paid_method
            .as_deref()
            .and_then(|m| m.parse::<PaymentMethod>().ok())
            .map(|m| m.ledger_method())
            .unwrap_or(LedgerMethod::Cash);

        record_movement(
            &mut *conn,
            NewMovement {
                kind: MovementKind::BillReversal,
                amount: bill.amount,
                method,
                related: RelatedEntity::Bill,
                related_id: bill.id,
                competency_month: &paid_month,
                created_by: auth.user_id,
            },
        )
        .await?;
    }
    Ok(())
}

async fn lock_bill(conn: &mut PgConnection, id: i64) -> Result<Bill, AppError> {
    sqlx::query_as::<_, Bill>(&format!("SELECT {BILL_COLUMNS} FROM bills WHERE id = $1 FOR UPDATE"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Bill not found"))
}

fn bill_status(bill: &Bill) -> Result<BillStatus, AppError> {
    bill.status
        .parse()
        .map_err(|_| AppError::internal(format!("Bill {} has unknown status '{}'", bill.id, bill.status)))
}

fn validate_amount(amount: f64) -> Result<(), AppError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(AppError::validation("Bill amount cannot be negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::Utc;
    use serde_json::json;
    use sqlx::PgPool;

    use crate::domain::ledger::competency_month;
    use crate::test_support::{app, movement_count, seed_user, send};

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
    async fn paying_a_bill_in_a_closed_month_changes_nothing(pool: PgPool) {
        let (admin, token) = seed_user(&pool, "admin").await;
        let bill: i64 = sqlx::query_scalar("INSERT INTO bills (name, amount) VALUES ('Rent', 1200) RETURNING id")
            .fetch_one(&pool)
            .await
            .unwrap();
        let month = competency_month(Utc::now());
        sqlx::query("INSERT INTO financial_closures (month, closed_by) VALUES ($1, $2)")
            .bind(&month)
            .bind(admin)
            .execute(&pool)
            .await
            .unwrap();

        let app = app(pool.clone());
        let (status, body) =
            send(&app, "PATCH", &format!("/bills/{bill}"), &token, Some(json!({ "action": "mark_paid" }))).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], format!("Financial month {month} is closed"));

        let (bill_status, paid_at): (String, Option<chrono::DateTime<Utc>>) =
            sqlx::query_as("SELECT status, paid_at FROM bills WHERE id = $1")
                .bind(bill)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(bill_status, "PENDING");
        assert!(paid_at.is_none());
        assert_eq!(movement_count(&pool, "BILL_PAYMENT").await, 0);
    }
}
