use axum::{routing::post, Router};
use crate::handlers::checkout::checkout;
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/checkout", post(checkout))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_auth))
}
