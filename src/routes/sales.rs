use axum::{
    routing::{get, post, patch},
    Router, middleware,
};
use crate::state::AppState;
use crate::handlers::sale;
use crate::middleware::auth::require_auth;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/pos/sales", get(sale::list_sales).post(sale::create_sale))
        .route("/pos/sales/{id}", get(sale::get_sale))
        .route("/pos/sales/{id}/payment", patch(sale::update_payment))
        .route("/pos/sales/{id}/receipt", get(sale::get_receipt))
        .route("/pos/sales/{id}/returns", post(sale::create_return))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}
