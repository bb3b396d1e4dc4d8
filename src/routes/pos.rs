use axum::{
    routing::{get, post, put, patch},
    Router, middleware,
};
use crate::state::AppState;
use crate::handlers::pos;
use crate::middleware::auth::require_auth;

pub fn routes(state: &AppState) -> Router<AppState> {
    // Register cart of the authenticated cashier
    Router::new()
        .route("/pos/cart", get(pos::get_cart).delete(pos::clear_cart))
        .route("/pos/cart/items", post(pos::add_item))
        .route("/pos/cart/items/{product_id}", patch(pos::update_item).delete(pos::remove_item))
        .route("/pos/cart/adjustments", put(pos::set_adjustments))
        .route("/pos/checkout", post(pos::checkout))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}
