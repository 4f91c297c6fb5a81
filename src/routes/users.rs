use axum::{Router, routing::{post, get}, middleware};
use crate::state::AppState;
use crate::handlers::user::{bootstrap_admin, register_user, login_user, list_users, get_me};
use crate::middleware::auth::require_auth;

pub fn routes(state: &AppState) -> Router<AppState> {
    let open = Router::new()
        .route("/users/bootstrap", post(bootstrap_admin))
        .route("/users/login", post(login_user));

    let protected = Router::new()
        .route("/users", get(list_users).post(register_user))
        .route("/users/me", get(get_me))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    open.merge(protected)
}
