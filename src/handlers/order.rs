use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::auth::capability::{authorize, Capability};
use crate::domain::payment::PaymentAllocation;
use crate::dtos::order::{OrderItemResponse, OrderListQuery, OrderResponse, OrderSummary};
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::order::{Order, OrderItem, OrderPayment, ORDER_COLUMNS};
use crate::state::AppState;

pub async fn list_orders(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<OrderListQuery>,
) -> Result<Json<Vec<OrderSummary>>, AppError> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1=1"));

    // Cashiers only see their own sales
    if authorize(&auth, Capability::ViewAllSales).is_err() {
        query.push(" AND cashier_id = ").push_bind(auth.user_id);
    }
    if let Some(client_id) = params.client_id {
        query.push(" AND client_id = ").push_bind(client_id);
    }
    if let Some(status) = params.status {
        query.push(" AND status = ").push_bind(status.to_uppercase());
    }
    if let Some(register_id) = params.cash_register_id {
        query.push(" AND cash_register_id = ").push_bind(register_id);
    }
    query.push(" ORDER BY created_at DESC, id DESC LIMIT 500");

    let orders = query.build_query_as::<Order>().fetch_all(&db_pool).await?;

    Ok(Json(orders.into_iter().map(OrderSummary::from).collect()))
}

pub async fn get_order(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = fetch_order_by_id(&db_pool, id).await?;

    if order.cashier_id != auth.user_id {
        authorize(&auth, Capability::ViewAllSales)?;
    }

    Ok(Json(order))
}

/// Loads an order together with its items and payment allocations.
pub async fn fetch_order_by_id(db_pool: &PgPool, id: i64) -> Result<OrderResponse, AppError> {
    let order = sqlx::query_as::<_, Order>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
        .bind(id)
        .fetch_optional(db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;

    let items = sqlx::query_as::<_, OrderItem>(
        r#"SELECT id, order_id, product_id, product_name, size, quantity,
                  unit_cost::FLOAT8 AS unit_cost, unit_price::FLOAT8 AS unit_price
           FROM order_items
           WHERE order_id = $1
           ORDER BY id"#,
    )
    .bind(id)
    .fetch_all(db_pool)
    .await?;

    let payments = sqlx::query_as::<_, OrderPayment>(
        "SELECT order_id, method, amount::FLOAT8 AS amount FROM order_payments WHERE order_id = $1 ORDER BY id",
    )
    .bind(id)
    .fetch_all(db_pool)
    .await?;

    let payments = payments
        .into_iter()
        .map(|p| {
            Ok(PaymentAllocation {
                method: p.method.parse().map_err(|_| {
                    AppError::internal(format!("Order {} has unknown payment method '{}'", p.order_id, p.method))
                })?,
                amount: p.amount,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(OrderResponse::assemble(
        order,
        items.into_iter().map(OrderItemResponse::from).collect(),
        payments,
    ))
}
