// src/handlers/product.rs
use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use sqlx::{Error as SqlxError, PgConnection};
use crate::auth::capability::{authorize, owner_scope, Capability};
use crate::dtos::product::{
    normalize_sizes, CreateProductRequest, ProductListQuery, ProductResponse, SizeStockDto,
    UpdateProductRequest,
};
use crate::error::AppError;
use crate::middleware::auth::AuthContext;
use crate::models::product::{Product, ProductSize, PRODUCT_COLUMNS};
use crate::state::AppState;
use tracing::{error, instrument};

fn map_unique_violation(err: SqlxError, message: &str) -> AppError {
    match err {
        SqlxError::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            AppError::validation(message)
        }
        SqlxError::Database(db_err) if db_err.code().as_deref() == Some("23503") => {
            AppError::validation("Referenced owner or supplier does not exist")
        }
        other => other.into(),
    }
}

fn validate_prices(cost_price: Option<f64>, sale_price: Option<f64>) -> Result<(), AppError> {
    for (label, value) in [("Cost price", cost_price), ("Sale price", sale_price)] {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                return Err(AppError::validation(format!("{label} cannot be negative")));
            }
        }
    }
    Ok(())
}

// GET /products - List products (owners only see their own)
#[instrument(skip(state, auth), fields(user_id = auth.user_id))]
pub async fn get_products(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(params): Query<ProductListQuery>,
) -> Result<Json<Vec<ProductResponse>>, AppError> {
    authorize(&auth, Capability::ViewCatalog)?;
    let scope = owner_scope(&auth)?;

    let pattern = params
        .q
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{q}%"));

    let products = match sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products
         WHERE ($1::BIGINT IS NULL OR owner_id = $1)
           AND ($2::TEXT IS NULL OR name ILIKE $2 OR sku ILIKE $2)
         ORDER BY name"
    ))
    .bind(scope)
    .bind(pattern)
    .fetch_all(&state.db_pool)
    .await
    {
        Ok(products) => products,
        Err(e) => {
            error!(?e, "Failed to fetch products");
            return Err(e.into());
        }
    };

    let ids: Vec<i64> = products.iter().map(|p| p.id).collect();
    let mut sizes = fetch_sizes(&state.db_pool, &ids).await?;

    let response = products
        .into_iter()
        .map(|p| {
            let product_sizes = sizes.remove(&p.id).unwrap_or_default();
            ProductResponse::new(p, product_sizes)
        })
        .collect();
    Ok(Json(response))
}

// GET /products/:id - Get single product
#[instrument(skip(state, auth), fields(id))]
pub async fn get_product(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ProductResponse>, AppError> {
    let product = sqlx::query_as::<_, Product>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
        .bind(id)
        .fetch_optional(&state.db_pool)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    authorize(&auth, Capability::ReadOwned { owner_id: product.owner_id })?;

    let sizes = fetch_sizes(&state.db_pool, &[id]).await?.remove(&id).unwrap_or_default();
    Ok(Json(ProductResponse::new(product, sizes)))
}

// POST /products - Create new product
#[instrument(skip(state, auth, payload), fields(sku = %payload.sku))]
pub async fn create_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), AppError> {
    authorize(&auth, Capability::ManageCatalog)?;

    let name = payload.name.trim();
    let sku = payload.sku.trim();
    if name.is_empty() || sku.is_empty() {
        return Err(AppError::validation("Name and SKU are required"));
    }
    validate_prices(Some(payload.cost_price), Some(payload.sale_price))?;

    let (sizes, sized_total) = normalize_sizes(&payload.sizes).map_err(AppError::validation)?;
    let stock = if sizes.is_empty() { payload.stock.unwrap_or(0) } else { sized_total };
    if stock < 0 {
        return Err(AppError::validation("Stock cannot be negative"));
    }

    let mut tx = state.db_pool.begin().await?;

    let product = sqlx::query_as::<_, Product>(&format!(
        "INSERT INTO products (name, sku, owner_id, supplier_id, cost_price, sale_price, stock, consigned)
         VALUES ($1, $2, $3, $4, $5::FLOAT8, $6::FLOAT8, $7, $8)
         RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(name)
    .bind(sku)
    .bind(payload.owner_id)
    .bind(payload.supplier_id)
    .bind(payload.cost_price)
    .bind(payload.sale_price)
    .bind(stock)
    .bind(payload.consigned)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| map_unique_violation(e, "SKU already exists"))?;

    let sizes = replace_sizes(&mut *tx, product.id, &sizes).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(ProductResponse::new(product, sizes))))
}

// PUT /products/:id - Update product
#[instrument(skip(state, auth, payload), fields(id))]
pub async fn update_product(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, AppError> {
    authorize(&auth, Capability::ManageCatalog)?;
    validate_prices(payload.cost_price, payload.sale_price)?;

    let sizes = payload
        .sizes
        .as_deref()
        .map(normalize_sizes)
        .transpose()
        .map_err(AppError::validation)?;

    // A new size list sets the aggregate; otherwise a sized product keeps its sum.
    let mut tx = state.db_pool.begin().await?;
    let has_sizes: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM product_sizes WHERE product_id = $1)")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

    let stock = match (&sizes, payload.stock) {
        (Some((list, total)), _) if !list.is_empty() => Some(*total),
        (Some(_), explicit) => explicit,
        (None, Some(_)) if has_sizes => {
            return Err(AppError::validation("Stock of a sized product is set through its sizes"))
        }
        (None, explicit) => explicit,
    };
    if stock.is_some_and(|s| s < 0) {
        return Err(AppError::validation("Stock cannot be negative"));
    }

    let product = sqlx::query_as::<_, Product>(&format!(
        "UPDATE products SET
         name = COALESCE($1, name),
         sku = COALESCE($2, sku),
         owner_id = COALESCE($3, owner_id),
         supplier_id = COALESCE($4, supplier_id),
         cost_price = COALESCE($5::FLOAT8, cost_price),
         sale_price = COALESCE($6::FLOAT8, sale_price),
         stock = COALESCE($7, stock),
         consigned = COALESCE($8, consigned),
         updated_at = now()
         WHERE id = $9 RETURNING {PRODUCT_COLUMNS}"
    ))
    .bind(payload.name.map(|n| n.trim().to_string()))
    .bind(payload.sku.map(|s| s.trim().to_string()))
    .bind(payload.owner_id)
    .bind(payload.supplier_id)
    .bind(payload.cost_price)
    .bind(payload.sale_price)
    .bind(stock)
    .bind(payload.consigned)
    .bind(id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| map_unique_violation(e, "SKU already exists"))?
    .ok_or_else(|| AppError::not_found("Product not found"))?;

    let sizes = match sizes {
        Some((list, _)) => replace_sizes(&mut *tx, id, &list).await?,
        None => {
            sqlx::query_as::<_, ProductSize>(
                "SELECT product_id, size, stock FROM product_sizes WHERE product_id = $1 ORDER BY size",
            )
            .bind(id)
            .fetch_all(&mut *tx)
            .await?
        }
    };

    tx.commit().await?;
    Ok(Json(ProductResponse::new(product, sizes)))
}

// DELETE /products/:id - Delete product
#[instrument(skip(state, auth), fields(id))]
pub async fn delete_product(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<serde_json::Value>, AppError> {
    authorize(&auth, Capability::ManageCatalog)?;

    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(&state.db_pool)
        .await
        .map_err(|e| match e {
            SqlxError::Database(db_err) if db_err.code().as_deref() == Some("23503") => {
                AppError::conflict("Product appears on orders and cannot be deleted")
            }
            other => other.into(),
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found("Product not found"));
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn replace_sizes(
    conn: &mut PgConnection,
    product_id: i64,
    sizes: &[SizeStockDto],
) -> Result<Vec<ProductSize>, AppError> {
    sqlx::query("DELETE FROM product_sizes WHERE product_id = $1")
        .bind(product_id)
        .execute(&mut *conn)
        .await?;

    let mut stored = Vec::with_capacity(sizes.len());
    for s in sizes {
        let row = sqlx::query_as::<_, ProductSize>(
            "INSERT INTO product_sizes (product_id, size, stock) VALUES ($1, $2, $3)
             RETURNING product_id, size, stock",
        )
        .bind(product_id)
        .bind(&s.size)
        .bind(s.stock)
        .fetch_one(&mut *conn)
        .await?;
        stored.push(row);
    }
    Ok(stored)
}

async fn fetch_sizes(
    db_pool: &sqlx::PgPool,
    product_ids: &[i64],
) -> Result<HashMap<i64, Vec<ProductSize>>, AppError> {
    let rows = sqlx::query_as::<_, ProductSize>(
        "SELECT product_id, size, stock FROM product_sizes WHERE product_id = ANY($1) ORDER BY product_id, size",
    )
    .bind(product_ids)
    .fetch_all(db_pool)
    .await?;

    let mut grouped: HashMap<i64, Vec<ProductSize>> = HashMap::new();
    for row in rows {
        grouped.entry(row.product_id).or_default().push(row);
    }
    Ok(grouped)
}
