use std::collections::HashMap;

use axum::{extract::State, Json, Extension};
use axum::http::StatusCode;
use chrono::Utc;
use sqlx::PgConnection;

use crate::auth::capability::{authorize, Capability};
use crate::domain::cash_register::{SalesIncrement, STATUS_OPEN};
use crate::domain::checkout::{
    apply_decrements, effective_discount, plan_checkout, CartLine, SizeStock, StockSnapshot,
};
use crate::domain::ledger::{competency_month, MovementKind, RelatedEntity};
use crate::domain::payment::allocate_payments;
use crate::dtos::order::{CheckoutRequest, OrderItemResponse, OrderResponse};
use crate::error::AppError;
use crate::handlers::finance::{ensure_month_open, record_movement, NewMovement};
use crate::middleware::auth::AuthContext;
use crate::models::order::{Order, ORDER_COLUMNS, STATUS_PAID, STATUS_PENDING};
use crate::models::product::ProductSize;
use crate::state::AppState;

#[derive(sqlx::FromRow)]
struct LockedProduct {
    id: i64,
    name: String,
    cost_price: f64,
    sale_price: f64,
    stock: i32,
}

pub async fn checkout(
    State(AppState { db_pool, .. }): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    authorize(&auth, Capability::Sell)?;

    if req.items.is_empty() {
        return Err(AppError::validation("Cart must contain at least one item"));
    }
    if req.pay_later {
        authorize(&auth, Capability::SellOnCredit)?;
    }

    let elevated = authorize(&auth, Capability::ApplyDiscount).is_ok();
    let discount = effective_discount(req.discount, elevated);
    if !elevated && req.discount.is_some_and(|d| d > 0.0) {
        tracing::debug!(user_id = auth.user_id, "Discount ignored for non-elevated caller");
    }

    let cart: Vec<CartLine> = req
        .items
        .iter()
        .map(|i| CartLine { product_id: i.product_id, size: i.size.clone(), quantity: i.quantity })
        .collect();

    let mut tx = db_pool.begin().await?;

    // Client comes first so a deferred sale fails fast on an unknown client.
    let client = match (req.pay_later, req.client_id) {
        (true, None) => return Err(AppError::validation("clientId is required for pay-later orders")),
        (pay_later, Some(client_id)) => Some(
            sqlx::query_as::<_, (i64, String)>(client_query(pay_later))
                .bind(client_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::not_found("Client not found"))?,
        ),
        (false, None) => None,
    };

    // Stock is read under row locks inside the transaction; a concurrent checkout
    // on the same product waits here and then sees the decremented values.
    let mut snapshots = lock_stock(&mut *tx, &cart).await?;

    let plan = plan_checkout(&cart, &snapshots, discount)?;
    let payments = allocate_payments(plan.total, req.payments, req.pay_later)?;

    apply_decrements(&mut snapshots, &plan.decrements);
    for d in &plan.decrements {
        let product = &snapshots[&d.product_id];
        if let Some(size) = &d.size {
            let remaining = product
                .sizes
                .iter()
                .find(|s| &s.size == size)
                .map(|s| s.stock)
                .unwrap_or_default();
            sqlx::query("UPDATE product_sizes SET stock = $3 WHERE product_id = $1 AND size = $2")
                .bind(d.product_id)
                .bind(size)
                .bind(remaining)
                .execute(&mut *tx)
                .await?;
        }
    }
    let mut touched: Vec<i64> = plan.decrements.iter().map(|d| d.product_id).collect();
    touched.sort_unstable();
    touched.dedup();
    for product_id in touched {
        sqlx::query("UPDATE products SET stock = $2, updated_at = now() WHERE id = $1")
            .bind(product_id)
            .bind(snapshots[&product_id].stock)
            .execute(&mut *tx)
            .await?;
    }

    let register_id = if req.pay_later {
        None
    } else {
        sqlx::query_scalar::<_, i64>(
            "SELECT id FROM cash_registers WHERE cashier_id = $1 AND status = $2 FOR UPDATE",
        )
        .bind(auth.user_id)
        .bind(STATUS_OPEN)
        .fetch_optional(&mut *tx)
        .await?
    };

    let (status, amount_paid, amount_remaining) = if req.pay_later {
        (STATUS_PENDING, 0.0, plan.total)
    } else {
        (STATUS_PAID, plan.total, 0.0)
    };

    let order = sqlx::query_as::<_, Order>(&format!(
        r#"INSERT INTO orders
            (cashier_id, cash_register_id, client_id, client_name, subtotal, discount, total, total_cost,
             pay_later, status, amount_paid, amount_remaining, paid_at)
           VALUES ($1, $2, $3, $4, $5::FLOAT8, $6::FLOAT8, $7::FLOAT8, $8::FLOAT8, $9, $10, $11::FLOAT8, $12::FLOAT8,
                   CASE WHEN $9 THEN NULL ELSE now() END)
           RETURNING {ORDER_COLUMNS}"#
    ))
    .bind(auth.user_id)
    .bind(register_id)
    .bind(client.as_ref().map(|c| c.0))
    .bind(client.as_ref().map(|c| c.1.clone()))
    .bind(plan.subtotal)
    .bind(plan.discount)
    .bind(plan.total)
    .bind(plan.total_cost)
    .bind(req.pay_later)
    .bind(status)
    .bind(amount_paid)
    .bind(amount_remaining)
    .fetch_one(&mut *tx)
    .await?;

    for line in &plan.lines {
        sqlx::query(
            r#"INSERT INTO order_items (order_id, product_id, product_name, size, quantity, unit_cost, unit_price)
               VALUES ($1, $2, $3, $4, $5, $6::FLOAT8, $7::FLOAT8)"#,
        )
        .bind(order.id)
        .bind(line.product_id)
        .bind(&line.product_name)
        .bind(&line.size)
        .bind(line.quantity)
        .bind(line.unit_cost)
        .bind(line.unit_price)
        .execute(&mut *tx)
        .await?;
    }

    for p in &payments {
        sqlx::query("INSERT INTO order_payments (order_id, method, amount) VALUES ($1, $2, $3::FLOAT8)")
            .bind(order.id)
            .bind(p.method.as_str())
            .bind(p.amount)
            .execute(&mut *tx)
            .await?;
    }

    if req.pay_later {
        // Deferred sales go to the client's tab and never touch the register.
        if let Some((client_id, _)) = &client {
            sqlx::query("UPDATE clients SET balance = balance + $2::FLOAT8 WHERE id = $1")
                .bind(client_id)
                .bind(plan.total)
                .execute(&mut *tx)
                .await?;
        }
    } else {
        book_immediate_sale(&mut *tx, &auth, order.id, register_id, &payments).await?;
    }

    tx.commit().await?;

    tracing::info!(
        order_id = order.id,
        cashier_id = auth.user_id,
        total = order.total,
        pay_later = order.pay_later,
        register_id = ?register_id,
        "Checkout committed"
    );

    let items = plan
        .lines
        .into_iter()
        .map(|l| OrderItemResponse {
            line_total: crate::domain::round_cents(l.unit_price * l.quantity as f64),
            product_id: l.product_id,
            product_name: l.product_name,
            size: l.size,
            quantity: l.quantity,
            unit_cost: l.unit_cost,
            unit_price: l.unit_price,
        })
        .collect();

    Ok((StatusCode::CREATED, Json(OrderResponse::assemble(order, items, payments))))
}

/// Only a deferred sale writes the client's balance, so only it locks the row.
/// An immediate sale just copies the name onto the order.
fn client_query(pay_later: bool) -> &'static str {
    if pay_later {
        "SELECT id, name FROM clients WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT id, name FROM clients WHERE id = $1"
    }
}

/// Locks every product in the cart (ascending id, so concurrent checkouts
/// acquire in the same order) together with its size rows.
async fn lock_stock(
    conn: &mut PgConnection,
    cart: &[CartLine],
) -> Result<HashMap<i64, StockSnapshot>, AppError> {
    let mut ids: Vec<i64> = cart.iter().map(|l| l.product_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let products = sqlx::query_as::<_, LockedProduct>(
        r#"SELECT id, name, cost_price::FLOAT8 AS cost_price, sale_price::FLOAT8 AS sale_price, stock
           FROM products
           WHERE id = ANY($1)
           ORDER BY id
           FOR UPDATE"#,
    )
    .bind(ids.as_slice())
    .fetch_all(&mut *conn)
    .await?;

    let sizes = sqlx::query_as::<_, ProductSize>(
        r#"SELECT product_id, size, stock
           FROM product_sizes
           WHERE product_id = ANY($1)
           ORDER BY product_id, size
           FOR UPDATE"#,
    )
    .bind(ids.as_slice())
    .fetch_all(&mut *conn)
    .await?;

    let mut snapshots: HashMap<i64, StockSnapshot> = products
        .into_iter()
        .map(|p| {
            (p.id, StockSnapshot {
                id: p.id,
                name: p.name,
                cost_price: p.cost_price,
                sale_price: p.sale_price,
                stock: p.stock,
                sizes: Vec::new(),
            })
        })
        .collect();

    for s in sizes {
        if let Some(snapshot) = snapshots.get_mut(&s.product_id) {
            snapshot.sizes.push(SizeStock { size: s.size, stock: s.stock });
        }
    }

    Ok(snapshots)
}

/// Adds an immediate sale to the cashier's open session (when there is one) and
/// books one SALE movement per payment allocation for the current month.
async fn book_immediate_sale(
    conn: &mut PgConnection,
    auth: &AuthContext,
    order_id: i64,
    register_id: Option<i64>,
    payments: &[crate::domain::payment::PaymentAllocation],
) -> Result<(), AppError> {
    let increment = SalesIncrement::from_payments(payments);
    if increment.is_empty() {
        return Ok(());
    }

    if let Some(register_id) = register_id {
        sqlx::query(
            r#"UPDATE cash_registers SET
                total_sales  = total_sales  + $2::FLOAT8,
                total_cash   = total_cash   + $3::FLOAT8,
                total_debit  = total_debit  + $4::FLOAT8,
                total_credit = total_credit + $5::FLOAT8,
                total_pix    = total_pix    + $6::FLOAT8
               WHERE id = $1"#,
        )
        .bind(register_id)
        .bind(increment.total)
        .bind(increment.cash)
        .bind(increment.debit)
        .bind(increment.credit)
        .bind(increment.pix)
        .execute(&mut *conn)
        .await?;
    }

    let month = competency_month(Utc::now());
    ensure_month_open(&mut *conn, &month).await?;
    for p in payments {
        record_movement(
            &mut *conn,
            NewMovement {
                kind: MovementKind::Sale,
                amount: p.amount,
                method: p.method.ledger_method(),
                related: RelatedEntity::Order,
                related_id: order_id,
                competency_month: &month,
                created_by: auth.user_id,
            },
        )
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    use super::client_query;
    use crate::test_support::{app, client_balance, movement_count, seed_client, seed_product, seed_user, send};

    #[test]
    fn only_deferred_sales_lock_the_client() {
        assert!(client_query(true).ends_with("FOR UPDATE"));
        assert!(!client_query(false).contains("FOR UPDATE"));
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
    async fn concurrent_checkouts_never_oversell(pool: PgPool) {
        let (_, token) = seed_user(&pool, "cashier").await;
        let product = seed_product(&pool, "TEE-01", 30.0, &[("M", 3)]).await;
        let app = app(pool.clone());
        let cart = json!({ "items": [{ "productId": product, "size": "M", "quantity": 2 }] });

        let (first, second) = tokio::join!(
            send(&app, "POST", "/checkout", &token, Some(cart.clone())),
            send(&app, "POST", "/checkout", &token, Some(cart.clone())),
        );
        let statuses = [first.0, second.0];
        assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CREATED).count(), 1);
        assert_eq!(statuses.iter().filter(|s| **s == StatusCode::BAD_REQUEST).count(), 1);

        let (size_stock, product_stock): (i32, i32) = sqlx::query_as(
            "SELECT s.stock, p.stock FROM product_sizes s JOIN products p ON p.id = s.product_id
             WHERE s.product_id = $1 AND s.size = 'M'",
        )
        .bind(product)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!((size_stock, product_stock), (1, 1));

        let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders").fetch_one(&pool).await.unwrap();
        assert_eq!(orders, 1);
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
    async fn pay_later_goes_to_the_client_tab(pool: PgPool) {
        let (_, token) = seed_user(&pool, "admin").await;
        let product = seed_product(&pool, "DRESS-01", 30.0, &[("M", 5)]).await;
        let client = seed_client(&pool, "Maria").await;
        let app = app(pool.clone());

        let (status, order) = send(
            &app,
            "POST",
            "/checkout",
            &token,
            Some(json!({
                "items": [{ "productId": product, "size": "M", "quantity": 2 }],
                "payLater": true,
                "clientId": client,
            })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["status"], "PENDING");
        assert_eq!(order["payments"], json!([]));
        assert_eq!(order["total"], 60.0);
        assert_eq!(client_balance(&pool, client).await, 60.0);

        let stored_payments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM order_payments")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(stored_payments, 0);
        assert_eq!(movement_count(&pool, "SALE").await, 0);
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL pointing at PostgreSQL"]
    async fn immediate_sale_names_the_client_without_touching_the_balance(pool: PgPool) {
        let (_, token) = seed_user(&pool, "cashier").await;
        let product = seed_product(&pool, "SCARF-01", 25.0, &[("U", 4)]).await;
        let client = seed_client(&pool, "Joana").await;
        let app = app(pool.clone());

        let (status, order) = send(
            &app,
            "POST",
            "/checkout",
            &token,
            Some(json!({
                "items": [{ "productId": product, "size": "U", "quantity": 1 }],
                "clientId": client,
            })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(order["status"], "PAID");
        assert_eq!(order["clientName"], "Joana");
        assert_eq!(client_balance(&pool, client).await, 0.0);
        assert_eq!(movement_count(&pool, "SALE").await, 1);
    }
}
