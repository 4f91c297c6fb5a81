use axum::{routing::get, Router};
use crate::handlers::order;
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/orders", get(order::list_orders))
        .route("/orders/{id}", get(order::get_order))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_auth))
}
