use axum::{routing::get, Router};
use crate::handlers::cash_register;
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/cash-register", get(cash_register::get_current).post(cash_register::handle_action))
        .route("/cash-register/history", get(cash_register::list_history))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_auth))
}
