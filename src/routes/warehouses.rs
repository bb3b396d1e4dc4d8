use axum::{
    routing::{get, put},
    Router, middleware,
};
use crate::state::AppState;
use crate::handlers::warehouse::{
    create_warehouse, get_warehouse, list_warehouses, update_warehouse, list_stock, set_stock,
};
use crate::middleware::auth::require_auth;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/settings/warehouses", get(list_warehouses).post(create_warehouse))
        .route("/settings/warehouses/{id}", get(get_warehouse).put(update_warehouse))
        .route("/settings/warehouses/{id}/stock", get(list_stock))
        .route("/settings/warehouses/{id}/stock/{product_id}", put(set_stock))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}
