use axum::{routing::{delete, get}, Router};
use crate::handlers::finance;
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/finance/closures", get(finance::list_closures).post(finance::create_closure))
        .route("/finance/closures/{month}", delete(finance::delete_closure))
        .route("/finance/movements", get(finance::list_movements))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_auth))
}
