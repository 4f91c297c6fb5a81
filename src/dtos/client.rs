use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::domain::payment::PaymentMethod;
use crate::models::client::Client;

#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub document: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateClientRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub document: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClientListQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientAction {
    PayOrder {
        order_id: i64,
        method: Option<PaymentMethod>,
    },
    AdjustBalance {
        amount: f64,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientResponse {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub document: Option<String>,
    pub balance: f64,
    pub created_at: DateTime<Utc>,
}

impl From<Client> for ClientResponse {
    fn from(c: Client) -> Self {
        Self {
            id: c.id,
            name: c.name,
            phone: c.phone,
            email: c.email,
            document: c.document,
            balance: c.balance,
            created_at: c.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_client_actions() {
        let pay: ClientAction =
            serde_json::from_value(json!({"action": "pay_order", "orderId": 31, "method": "CARD_DEBIT"})).unwrap();
        assert!(matches!(
            pay,
            ClientAction::PayOrder { order_id: 31, method: Some(PaymentMethod::CardDebit) }
        ));

        let adjust: ClientAction =
            serde_json::from_value(json!({"action": "adjust_balance", "amount": -25.5})).unwrap();
        assert!(matches!(adjust, ClientAction::AdjustBalance { amount } if amount == -25.5));

        assert!(serde_json::from_value::<ClientAction>(json!({"action": "pay_order"})).is_err());
    }
}
