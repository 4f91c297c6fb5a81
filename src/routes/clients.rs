use axum::{routing::get, Router};
use crate::handlers::client;
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/clients", get(client::list_clients).post(client::create_client))
        .route(
            "/clients/{id}",
            get(client::get_client)
                .put(client::update_client)
                .patch(client::handle_action)
                .delete(client::delete_client),
        )
        .route("/clients/{id}/orders", get(client::list_pending_orders))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_auth))
}
