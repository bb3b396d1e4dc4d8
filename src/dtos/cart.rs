use serde::{Deserialize, Serialize};

use crate::pos::cart::{Adjustments, Cart, CartItem, Totals};

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: Option<i64>,
    /// Barcode/product code, used when `product_id` is absent.
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct CartLineResponse {
    #[serde(flatten)]
    pub item: CartItem,
    pub line_total: f64,
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub items: Vec<CartLineResponse>,
    pub adjustments: Adjustments,
    pub totals: Totals,
}

impl From<&Cart> for CartResponse {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart
                .items()
                .iter()
                .map(|item| CartLineResponse { line_total: item.line_total(), item: item.clone() })
                .collect(),
            adjustments: cart.adjustments(),
            totals: cart.totals(),
        }
    }
}
