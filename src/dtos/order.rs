use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::domain::payment::PaymentAllocation;
use crate::models::order::{Order, OrderItem};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutItemRequest>,
    pub payments: Option<Vec<PaymentAllocation>>,
    pub discount: Option<f64>,
    pub client_id: Option<i64>,
    #[serde(default)]
    pub pay_later: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItemRequest {
    pub product_id: i64,
    pub size: Option<String>,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
    pub client_id: Option<i64>,
    pub status: Option<String>,
    pub cash_register_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: i64,
    pub cashier_id: i64,
    pub cash_register_id: Option<i64>,
    pub client_id: Option<i64>,
    pub client_name: Option<String>,
    pub items: Vec<OrderItemResponse>,
    pub payments: Vec<PaymentAllocation>,
    pub subtotal: f64,
    pub discount: f64,
    pub total: f64,
    pub total_cost: f64,
    pub pay_later: bool,
    pub status: String,
    pub amount_paid: f64,
    pub amount_remaining: f64,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub product_id: i64,
    pub product_name: String,
    pub size: Option<String>,
    pub quantity: i32,
    pub unit_cost: f64,
    pub unit_price: f64,
    pub line_total: f64,
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        Self {
            line_total: crate::domain::round_cents(item.unit_price * item.quantity as f64),
            product_id: item.product_id,
            product_name: item.product_name,
            size: item.size,
            quantity: item.quantity,
            unit_cost: item.unit_cost,
            unit_price: item.unit_price,
        }
    }
}

impl OrderResponse {
    pub fn assemble(order: Order, items: Vec<OrderItemResponse>, payments: Vec<PaymentAllocation>) -> Self {
        Self {
            id: order.id,
            cashier_id: order.cashier_id,
            cash_register_id: order.cash_register_id,
            client_id: order.client_id,
            client_name: order.client_name,
            items,
            payments,
            subtotal: order.subtotal,
            discount: order.discount,
            total: order.total,
            total_cost: order.total_cost,
            pay_later: order.pay_later,
            status: order.status,
            amount_paid: order.amount_paid,
            amount_remaining: order.amount_remaining,
            paid_at: order.paid_at,
            created_at: order.created_at,
        }
    }
}

/// Lightweight row for order lists.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: i64,
    pub client_name: Option<String>,
    pub total: f64,
    pub pay_later: bool,
    pub status: String,
    pub amount_remaining: f64,
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderSummary {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            client_name: order.client_name,
            total: order.total,
            pay_later: order.pay_later,
            status: order.status,
            amount_remaining: order.amount_remaining,
            created_at: order.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::PaymentMethod;
    use serde_json::json;

    #[test]
    fn parses_checkout_body() {
        let req: CheckoutRequest = serde_json::from_value(json!({
            "items": [{"productId": 1, "size": "M", "quantity": 2}],
            "payments": [{"method": "PIX", "amount": 99.8}],
            "discount": 0
        }))
        .unwrap();

        assert_eq!(req.items[0].product_id, 1);
        assert_eq!(req.items[0].size.as_deref(), Some("M"));
        assert!(!req.pay_later);
        assert_eq!(req.payments.unwrap()[0].method, PaymentMethod::Pix);
    }

    #[test]
    fn parses_pay_later_body() {
        let req: CheckoutRequest = serde_json::from_value(json!({
            "items": [{"productId": 4, "quantity": 1}],
            "clientId": 12,
            "payLater": true
        }))
        .unwrap();
        assert!(req.pay_later);
        assert_eq!(req.client_id, Some(12));
        assert!(req.payments.is_none());
    }
}
