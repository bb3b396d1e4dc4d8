// src/handlers/pos.rs
use axum::{extract::{Path, State}, Json, Extension};
use axum::http::StatusCode;
use tracing::{instrument, Instrument};
use crate::state::AppState;
use crate::error::AppError;
use crate::dtos::cart::{AddToCartRequest, CartResponse, UpdateQuantityRequest};
use crate::dtos::sale::{CheckoutRequest, CheckoutResponse};
use crate::handlers::product::{fetch_product, fetch_product_by_code};
use crate::handlers::sale::{persist_sale, SaleTarget};
use crate::middleware::auth::AuthContext;
use crate::pos::cart::Adjustments;
use crate::pos::checkout::prepare_sale;

// GET /pos/cart
pub async fn get_cart(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Json<CartResponse> {
    let cart = state.register.snapshot(auth.user_id).await;
    Json(CartResponse::from(&cart))
}

// POST /pos/cart/items - click on a product tile or scan a code
#[instrument(skip(state, auth), fields(user_id = auth.user_id))]
pub async fn add_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<AddToCartRequest>,
) -> Result<Json<CartResponse>, AppError> {
    let product = match (req.product_id, req.code.as_deref()) {
        (Some(id), _) => fetch_product(&state.db_pool, id).await?,
        (None, Some(code)) if !code.trim().is_empty() => fetch_product_by_code(&state.db_pool, code).await?,
        _ => return Err(AppError::validation("Either product_id or code is required")),
    };

    let response = state
        .register
        .with_cart(auth.user_id, |cart| {
            cart.add_to_cart(&product)?;
            Ok::<_, AppError>(CartResponse::from(&*cart))
        })
        .await?;

    Ok(Json(response))
}

// PATCH /pos/cart/items/:product_id - quantity <= 0 removes the line
#[instrument(skip(state, auth), fields(user_id = auth.user_id))]
pub async fn update_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(product_id): Path<i64>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<CartResponse>, AppError> {
    let response = state
        .register
        .with_cart(auth.user_id, |cart| {
            cart.update_quantity(product_id, req.quantity)?;
            Ok::<_, AppError>(CartResponse::from(&*cart))
        })
        .await?;

    Ok(Json(response))
}

// DELETE /pos/cart/items/:product_id
pub async fn remove_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(product_id): Path<i64>,
) -> Result<Json<CartResponse>, AppError> {
    let response = state
        .register
        .with_cart(auth.user_id, |cart| {
            cart.remove(product_id)?;
            Ok::<_, AppError>(CartResponse::from(&*cart))
        })
        .await?;

    Ok(Json(response))
}

// PUT /pos/cart/adjustments - tax, shipping, discount
pub async fn set_adjustments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<Adjustments>,
) -> Result<Json<CartResponse>, AppError> {
    let response = state
        .register
        .with_cart(auth.user_id, |cart| {
            cart.set_adjustments(req)?;
            Ok::<_, AppError>(CartResponse::from(&*cart))
        })
        .await?;

    Ok(Json(response))
}

// DELETE /pos/cart
pub async fn clear_cart(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> StatusCode {
    state.register.clear(auth.user_id).await;
    StatusCode::NO_CONTENT
}

// POST /pos/checkout - turns the register cart into a sale
#[instrument(skip(state, auth, req), fields(user_id = auth.user_id))]
pub async fn checkout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), AppError> {
    // Detached so a dropped request still either records or restores the taken cart
    let task = tokio::spawn(
        async move {
            let cart = state.register.take(auth.user_id).await;

            let draft = match prepare_sale(&cart, &req.payment) {
                Ok(draft) => draft,
                Err(e) => {
                    state.register.restore(auth.user_id, cart).await;
                    return Err(e);
                }
            };

            let target = SaleTarget { customer_id: req.customer_id, warehouse_id: req.warehouse_id, notes: req.notes };

            match persist_sale(&state, &auth, target, &draft).await {
                Ok(sale) => Ok(sale),
                Err(e) => {
                    tracing::warn!(error = %e, "Checkout failed, cart restored");
                    state.register.restore(auth.user_id, cart).await;
                    Err(e)
                }
            }
        }
        .in_current_span(),
    );

    let sale = task
        .await
        .map_err(|e| AppError::internal(format!("Checkout task failed: {e}")))??;
    let receipt_url = format!("/api/pos/sales/{}/receipt", sale.id);

    Ok((StatusCode::CREATED, Json(CheckoutResponse { sale, receipt_url })))
}
