use axum::{
    routing::{get, post, put},
    Router, middleware,
};
use crate::handlers::product::{
    get_products, get_product, get_product_by_code, create_product, update_product, delete_product,
    get_categories, create_category,
};
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    // Catalog browsing is open so the product grid can load before login
    let open = Router::new()
        .route("/products", get(get_products))
        .route("/products/{id}", get(get_product))
        .route("/products/code/{code}", get(get_product_by_code))
        .route("/categories", get(get_categories));

    // Catalog maintenance is manager-only (checked in handlers)
    let protected = Router::new()
        .route("/products", post(create_product))
        .route("/products/{id}", put(update_product).delete(delete_product))
        .route("/categories", post(create_category))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    open.merge(protected)
}
