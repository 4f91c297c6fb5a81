use axum::{routing::get, Router};
use crate::handlers::owner::{create_owner, delete_owner, get_owner, list_owners, update_owner};
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/owners", get(list_owners).post(create_owner))
        .route("/owners/{id}", get(get_owner).put(update_owner).delete(delete_owner))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_auth))
}
