use axum::{routing::get, Router};
use crate::handlers::bill;
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/bills", get(bill::list_bills).post(bill::create_bill))
        .route(
            "/bills/{id}",
            get(bill::get_bill)
                .put(bill::update_bill)
                .patch(bill::handle_action)
                .delete(bill::delete_bill),
        )
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_auth))
}
