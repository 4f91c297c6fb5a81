// src/dtos/product.rs
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::models::product::{Product, ProductSize};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SizeStockDto {
    pub size: String,
    pub stock: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub sku: String,
    pub owner_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub cost_price: f64,
    pub sale_price: f64,
    /// Ignored when `sizes` is non-empty; the aggregate is derived from them.
    pub stock: Option<i32>,
    #[serde(default)]
    pub sizes: Vec<SizeStockDto>,
    #[serde(default)]
    pub consigned: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub owner_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub cost_price: Option<f64>,
    pub sale_price: Option<f64>,
    pub stock: Option<i32>,
    /// Replaces the whole size list when present.
    pub sizes: Option<Vec<SizeStockDto>>,
    pub consigned: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub sku: String,
    pub owner_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub cost_price: f64,
    pub sale_price: f64,
    pub stock: i32,
    pub sizes: Vec<SizeStockDto>,
    pub consigned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductResponse {
    pub fn new(product: Product, sizes: Vec<ProductSize>) -> Self {
        Self {
            id: product.id,
            name: product.name,
            sku: product.sku,
            owner_id: product.owner_id,
            supplier_id: product.supplier_id,
            cost_price: product.cost_price,
            sale_price: product.sale_price,
            stock: product.stock,
            sizes: sizes
                .into_iter()
                .map(|s| SizeStockDto { size: s.size, stock: s.stock })
                .collect(),
            consigned: product.consigned,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

/// Checks a size list and returns it trimmed along with its stock sum.
pub fn normalize_sizes(sizes: &[SizeStockDto]) -> Result<(Vec<SizeStockDto>, i32), String> {
    let mut seen: Vec<String> = Vec::with_capacity(sizes.len());
    let mut out = Vec::with_capacity(sizes.len());
    for s in sizes {
        let size = s.size.trim();
        if size.is_empty() {
            return Err("Size name cannot be empty".into());
        }
        if s.stock < 0 {
            return Err(format!("Stock for size {size} cannot be negative"));
        }
        if seen.iter().any(|k| k.eq_ignore_ascii_case(size)) {
            return Err(format!("Size {size} is listed more than once"));
        }
        seen.push(size.to_string());
        out.push(SizeStockDto { size: size.to_string(), stock: s.stock });
    }
    let total = out
        .iter()
        .try_fold(0i32, |acc, s| acc.checked_add(s.stock))
        .ok_or_else(|| "Total stock is too large".to_string())?;
    Ok((out, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(size: &str, stock: i32) -> SizeStockDto {
        SizeStockDto { size: size.into(), stock }
    }

    #[test]
    fn sums_sizes_into_aggregate() {
        let (sizes, total) = normalize_sizes(&[size(" P ", 4), size("M", 15), size("G", 2)]).unwrap();
        assert_eq!(total, 21);
        assert_eq!(sizes[0].size, "P");
    }

    #[test]
    fn rejects_duplicate_and_negative_sizes() {
        assert!(normalize_sizes(&[size("M", 1), size("m", 2)]).is_err());
        assert!(normalize_sizes(&[size("M", -1)]).is_err());
        assert!(normalize_sizes(&[size("  ", 1)]).is_err());
    }

    #[test]
    fn rejects_stock_total_beyond_i32() {
        assert!(normalize_sizes(&[size("M", i32::MAX), size("L", 1)]).is_err());
    }
}
