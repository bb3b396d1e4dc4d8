// src/pos/returns.rs
use super::cart::{Cart, CartError, CartItem};

/// A line of a recorded sale with what has already come back.
#[derive(Debug, Clone)]
pub struct SoldLine {
    pub product_id: i64,
    pub name: String,
    pub unit_price: f64,
    pub sold: i32,
    pub returned: i64,
}

impl SoldLine {
    pub fn returnable(&self) -> i32 {
        // Never above `sold`, so the narrowing cannot truncate.
        (i64::from(self.sold) - self.returned).clamp(0, i64::from(self.sold)) as i32
    }
}

/// Builds the cart of lines going back. Each requested quantity is clamped
/// into `[1, sold - returned]`; lines not requested are left out. A repeated
/// product id keeps its last quantity.
pub fn select_returns(sold: &[SoldLine], requested: &[(i64, i32)]) -> Result<Cart, CartError> {
    let mut cart = Cart::from_lines(
        sold.iter()
            .map(|line| CartItem {
                id: line.product_id,
                name: line.name.clone(),
                price: line.unit_price,
                quantity: line.returnable(),
            })
            .collect(),
    );

    for &(product_id, quantity) in requested {
        let line = sold
            .iter()
            .find(|l| l.product_id == product_id)
            .ok_or(CartError::NotSold(product_id))?;
        cart.update_quantity_bounded(product_id, quantity, line.returnable())?;
    }
    cart.retain_lines(|line| requested.iter().any(|&(id, _)| id == line.id));

    Ok(cart)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sold(product_id: i64, unit_price: f64, sold: i32, returned: i64) -> SoldLine {
        SoldLine { product_id, name: format!("Item {product_id}"), unit_price, sold, returned }
    }

    fn quantities(cart: &Cart) -> Vec<(i64, i32)> {
        cart.items().iter().map(|i| (i.id, i.quantity)).collect()
    }

    #[test]
    fn test_partially_returned_line_is_capped_at_remainder() {
        let lines = [sold(1, 4.0, 5, 3)];

        let cart = select_returns(&lines, &[(1, 10)]).unwrap();
        assert_eq!(quantities(&cart), vec![(1, 2)]);
        assert_eq!(cart.totals().subtotal, 8.0);
    }

    #[test]
    fn test_requested_quantity_below_one_returns_one() {
        let lines = [sold(1, 4.0, 5, 0)];
        let cart = select_returns(&lines, &[(1, 0)]).unwrap();
        assert_eq!(quantities(&cart), vec![(1, 1)]);
    }

    #[test]
    fn test_fully_returned_line_has_nothing_returnable() {
        let lines = [sold(1, 4.0, 2, 2), sold(2, 1.0, 1, 0)];
        assert_eq!(select_returns(&lines, &[(1, 1)]).unwrap_err(), CartError::NothingReturnable(1));
    }

    #[test]
    fn test_unrequested_lines_are_dropped() {
        let lines = [sold(1, 4.0, 2, 0), sold(2, 1.0, 3, 0), sold(3, 2.0, 1, 0)];

        let cart = select_returns(&lines, &[(2, 2)]).unwrap();
        assert_eq!(quantities(&cart), vec![(2, 2)]);
        assert_eq!(cart.totals().subtotal, 2.0);
    }

    #[test]
    fn test_product_not_in_sale_is_rejected() {
        let lines = [sold(1, 4.0, 2, 0)];
        assert_eq!(select_returns(&lines, &[(9, 1)]).unwrap_err(), CartError::NotSold(9));
    }

    #[test]
    fn test_repeated_request_keeps_last_quantity() {
        let lines = [sold(1, 4.0, 5, 0)];
        let cart = select_returns(&lines, &[(1, 3), (1, 1)]).unwrap();
        assert_eq!(quantities(&cart), vec![(1, 1)]);
    }
}
