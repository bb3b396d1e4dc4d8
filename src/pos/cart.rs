// src/pos/cart.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::AppError;
use crate::models::product::Product;

/// One product entry in the cart. `id` is the product id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub quantity: i32,
}

impl CartItem {
    pub fn line_total(&self) -> f64 {
        self.price * self.quantity as f64
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Adjustments {
    #[serde(default)]
    pub tax: f64,
    #[serde(default)]
    pub shipping: f64,
    #[serde(default)]
    pub discount: f64,
}

impl Adjustments {
    pub fn validate(&self) -> Result<(), CartError> {
        for (field, value) in [("tax", self.tax), ("shipping", self.shipping), ("discount", self.discount)] {
            if !value.is_finite() || value < 0.0 {
                return Err(CartError::InvalidAdjustment(field));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Totals {
    pub subtotal: f64,
    pub tax: f64,
    pub shipping: f64,
    pub discount: f64,
    pub grand_total: f64,
    pub total_items: i64,
}

/// Derives the payable amounts from a set of lines. Nothing here is cached.
pub fn compute_totals(items: &[CartItem], adjustments: &Adjustments) -> Totals {
    let subtotal: f64 = items.iter().map(CartItem::line_total).sum();
    Totals {
        subtotal,
        tax: adjustments.tax,
        shipping: adjustments.shipping,
        discount: adjustments.discount,
        grand_total: subtotal + adjustments.tax + adjustments.shipping - adjustments.discount,
        total_items: items.iter().map(|i| i64::from(i.quantity)).sum(),
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CartError {
    #[error("Product {0} is not in the cart")]
    LineNotFound(i64),
    #[error("{0} must be a non-negative number")]
    InvalidAdjustment(&'static str),
    #[error("Nothing left to return for product {0}")]
    NothingReturnable(i64),
    #[error("Product {0} was not sold in this sale")]
    NotSold(i64),
    #[error("Quantity for product {0} is too large")]
    QuantityOverflow(i64),
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::LineNotFound(_) | CartError::NotSold(_) => AppError::not_found(err.to_string()),
            CartError::InvalidAdjustment(_) | CartError::NothingReturnable(_) | CartError::QuantityOverflow(_) => {
                AppError::validation(err.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    items: Vec<CartItem>,
    adjustments: Adjustments,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a cart from existing lines, dropping any with quantity <= 0.
    pub fn from_lines(lines: Vec<CartItem>) -> Self {
        Self {
            items: lines.into_iter().filter(|l| l.quantity > 0).collect(),
            adjustments: Adjustments::default(),
        }
    }

    /// Builds a cart from submitted lines. Repeated product ids collapse into
    /// one line, like repeat clicks at the register; the first price wins.
    pub fn collapse_lines(lines: Vec<CartItem>) -> Result<Self, CartError> {
        let mut cart = Cart::new();
        cart.merge_lines(&Cart::from_lines(lines))?;
        Ok(cart)
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn adjustments(&self) -> Adjustments {
        self.adjustments
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&CartItem> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Increments the line for `product` or appends a new one with quantity 1.
    /// Stock is not checked here; the sale transaction does that.
    pub fn add_to_cart(&mut self, product: &Product) -> Result<&CartItem, CartError> {
        let idx = match self.items.iter().position(|i| i.id == product.id) {
            Some(idx) => {
                let line = &mut self.items[idx];
                line.quantity = line
                    .quantity
                    .checked_add(1)
                    .ok_or(CartError::QuantityOverflow(product.id))?;
                idx
            }
            None => {
                self.items.push(CartItem {
                    id: product.id,
                    name: product.name.clone(),
                    price: product.price,
                    quantity: 1,
                });
                self.items.len() - 1
            }
        };
        Ok(&self.items[idx])
    }

    /// Sets the quantity of a line. `new_quantity <= 0` removes the line and
    /// returns `None`.
    pub fn update_quantity(&mut self, id: i64, new_quantity: i32) -> Result<Option<&CartItem>, CartError> {
        let idx = self.position(id)?;
        if new_quantity <= 0 {
            self.items.remove(idx);
            return Ok(None);
        }
        self.items[idx].quantity = new_quantity;
        Ok(Some(&self.items[idx]))
    }

    /// Return/adjustment variant: the quantity is clamped into `[1, max]`,
    /// `max` being what was originally sold and not yet returned.
    pub fn update_quantity_bounded(&mut self, id: i64, new_quantity: i32, max: i32) -> Result<&CartItem, CartError> {
        if max < 1 {
            return Err(CartError::NothingReturnable(id));
        }
        let idx = self.position(id)?;
        self.items[idx].quantity = new_quantity.clamp(1, max);
        Ok(&self.items[idx])
    }

    pub fn remove(&mut self, id: i64) -> Result<CartItem, CartError> {
        let idx = self.position(id)?;
        Ok(self.items.remove(idx))
    }

    /// Adds the quantities of `other`'s lines into this cart. Adjustments of
    /// `self` win. On overflow the cart is left untouched.
    pub fn merge_lines(&mut self, other: &Cart) -> Result<(), CartError> {
        let mut items = self.items.clone();
        for line in &other.items {
            match items.iter_mut().find(|i| i.id == line.id) {
                Some(existing) => {
                    existing.quantity = existing
                        .quantity
                        .checked_add(line.quantity)
                        .ok_or(CartError::QuantityOverflow(line.id))?;
                }
                None => items.push(line.clone()),
            }
        }
        self.items = items;
        Ok(())
    }

    /// Keeps only the lines matching `keep`.
    pub fn retain_lines<F: FnMut(&CartItem) -> bool>(&mut self, keep: F) {
        self.items.retain(keep);
    }

    pub fn set_adjustments(&mut self, adjustments: Adjustments) -> Result<(), CartError> {
        adjustments.validate()?;
        self.adjustments = adjustments;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.adjustments = Adjustments::default();
    }

    pub fn totals(&self) -> Totals {
        compute_totals(&self.items, &self.adjustments)
    }

    fn position(&self, id: i64) -> Result<usize, CartError> {
        self.items
            .iter()
            .position(|i| i.id == id)
            .ok_or(CartError::LineNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: i64, price: f64) -> Product {
        Product {
            id,
            name: format!("Product {id}"),
            code: format!("P{id:04}"),
            price,
            image: None,
            category_id: None,
            category_name: None,
            created_at: None,
        }
    }

    fn assert_subtotal_matches_lines(cart: &Cart) {
        let expected: f64 = cart.items().iter().map(|i| i.price * i.quantity as f64).sum();
        assert!((cart.totals().subtotal - expected).abs() < 1e-9);
        assert!(cart.items().iter().all(|i| i.quantity > 0));
    }

    #[test]
    fn test_adding_same_product_twice_yields_one_line() {
        let mut cart = Cart::new();
        let milk = product(1, 2.5);
        cart.add_to_cart(&milk).unwrap();
        cart.add_to_cart(&milk).unwrap();

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 2);
        assert_eq!(cart.totals().subtotal, 5.0);
    }

    #[test]
    fn test_new_product_appends_with_quantity_one() {
        let mut cart = Cart::new();
        cart.add_to_cart(&product(1, 10.0)).unwrap();
        let line = cart.add_to_cart(&product(2, 5.0)).unwrap().clone();

        assert_eq!(line.quantity, 1);
        assert_eq!(cart.items().iter().map(|i| i.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_zero_quantity_removes_line() {
        let mut cart = Cart::new();
        cart.add_to_cart(&product(1, 10.0)).unwrap();
        cart.add_to_cart(&product(2, 5.0)).unwrap();

        assert_eq!(cart.update_quantity(1, 0).unwrap(), None);
        assert!(cart.get(1).is_none());
        assert_eq!(cart.items().len(), 1);
    }

    #[test]
    fn test_negative_quantity_removes_line() {
        let mut cart = Cart::new();
        cart.add_to_cart(&product(1, 10.0)).unwrap();
        assert_eq!(cart.update_quantity(1, -3).unwrap(), None);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_unknown_line_is_not_found() {
        let mut cart = Cart::new();
        assert_eq!(cart.update_quantity(9, 2), Err(CartError::LineNotFound(9)));
        assert!(matches!(AppError::from(CartError::LineNotFound(9)), AppError::NotFound(_)));
    }

    #[test]
    fn test_two_line_cart_with_adjustments_totals() {
        let mut cart = Cart::new();
        cart.add_to_cart(&product(1, 10.0)).unwrap();
        cart.update_quantity(1, 2).unwrap();
        cart.add_to_cart(&product(2, 5.0)).unwrap();
        cart.set_adjustments(Adjustments { tax: 1.0, shipping: 2.0, discount: 3.0 }).unwrap();

        let totals = cart.totals();
        assert_eq!(totals.subtotal, 25.0);
        assert_eq!(totals.grand_total, 25.0);
        assert_eq!(totals.total_items, 3);
    }

    #[test]
    fn test_grand_total_formula_holds_for_adjustments() {
        let mut cart = Cart::new();
        cart.add_to_cart(&product(1, 3.75)).unwrap();
        cart.update_quantity(1, 4).unwrap();

        for (tax, shipping, discount) in [(0.0, 0.0, 0.0), (1.5, 0.0, 2.0), (0.3, 7.0, 0.1), (100.0, 50.0, 200.0)] {
            cart.set_adjustments(Adjustments { tax, shipping, discount }).unwrap();
            let t = cart.totals();
            assert!((t.grand_total - (t.subtotal + tax + shipping - discount)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_subtotal_tracks_mixed_operation_sequence() {
        let mut cart = Cart::new();
        let ops: [(i64, Option<i32>); 10] = [
            (1, None),
            (2, None),
            (1, None),
            (3, None),
            (2, Some(5)),
            (3, Some(0)),
            (1, Some(-1)),
            (4, None),
            (4, None),
            (2, Some(1)),
        ];
        for (id, qty) in ops {
            match qty {
                None => {
                    cart.add_to_cart(&product(id, id as f64 * 1.25)).unwrap();
                }
                Some(q) => {
                    cart.update_quantity(id, q).unwrap();
                }
            }
            assert_subtotal_matches_lines(&cart);
        }
        assert_eq!(cart.items().iter().map(|i| (i.id, i.quantity)).collect::<Vec<_>>(), vec![(2, 1), (4, 2)]);
    }

    #[test]
    fn test_negative_adjustment_rejected() {
        let mut cart = Cart::new();
        let err = cart
            .set_adjustments(Adjustments { tax: 0.0, shipping: -1.0, discount: 0.0 })
            .unwrap_err();
        assert_eq!(err, CartError::InvalidAdjustment("shipping"));
        assert_eq!(cart.adjustments(), Adjustments::default());
    }

    #[test]
    fn test_nan_adjustment_rejected() {
        let adj = Adjustments { tax: f64::NAN, shipping: 0.0, discount: 0.0 };
        assert_eq!(adj.validate(), Err(CartError::InvalidAdjustment("tax")));
    }

    #[test]
    fn test_bounded_update_clamps_into_range() {
        let mut cart = Cart::from_lines(vec![CartItem { id: 7, name: "Yogurt".into(), price: 1.0, quantity: 3 }]);

        assert_eq!(cart.update_quantity_bounded(7, 10, 3).unwrap().quantity, 3);
        assert_eq!(cart.update_quantity_bounded(7, 0, 3).unwrap().quantity, 1);
        assert_eq!(cart.update_quantity_bounded(7, -4, 3).unwrap().quantity, 1);
        assert_eq!(cart.update_quantity_bounded(7, 2, 3).unwrap().quantity, 2);
        assert_eq!(cart.update_quantity_bounded(7, 2, 0), Err(CartError::NothingReturnable(7)));
    }

    #[test]
    fn test_from_lines_drops_empty_lines() {
        let cart = Cart::from_lines(vec![
            CartItem { id: 1, name: "A".into(), price: 1.0, quantity: 0 },
            CartItem { id: 2, name: "B".into(), price: 1.0, quantity: 2 },
        ]);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].id, 2);
    }

    #[test]
    fn test_clear_resets_lines_and_adjustments() {
        let mut cart = Cart::new();
        cart.add_to_cart(&product(1, 1.0)).unwrap();
        cart.set_adjustments(Adjustments { tax: 1.0, shipping: 1.0, discount: 0.0 }).unwrap();
        cart.clear();

        assert!(cart.is_empty());
        assert_eq!(cart.totals().grand_total, 0.0);
    }

    #[test]
    fn test_remove_returns_line() {
        let mut cart = Cart::new();
        cart.add_to_cart(&product(5, 2.0)).unwrap();
        let removed = cart.remove(5).unwrap();
        assert_eq!(removed.id, 5);
        assert_eq!(cart.remove(5), Err(CartError::LineNotFound(5)));
    }

    #[test]
    fn test_add_past_max_quantity_is_rejected() {
        let mut cart = Cart::new();
        let p = product(1, 1.0);
        cart.add_to_cart(&p).unwrap();
        cart.update_quantity(1, i32::MAX).unwrap();

        assert_eq!(cart.add_to_cart(&p).unwrap_err(), CartError::QuantityOverflow(1));
        assert_eq!(cart.get(1).map(|l| l.quantity), Some(i32::MAX));
        assert_subtotal_matches_lines(&cart);
        assert!(matches!(AppError::from(CartError::QuantityOverflow(1)), AppError::ValidationError(_)));
    }

    #[test]
    fn test_merge_overflow_leaves_cart_untouched() {
        let mut cart = Cart::from_lines(vec![
            CartItem { id: 1, name: "A".into(), price: 1.0, quantity: 2 },
            CartItem { id: 2, name: "B".into(), price: 1.0, quantity: i32::MAX },
        ]);
        let before = cart.clone();
        let other = Cart::from_lines(vec![
            CartItem { id: 1, name: "A".into(), price: 1.0, quantity: 3 },
            CartItem { id: 2, name: "B".into(), price: 1.0, quantity: 1 },
        ]);

        assert_eq!(cart.merge_lines(&other), Err(CartError::QuantityOverflow(2)));
        assert_eq!(cart, before);
    }

    #[test]
    fn test_total_items_does_not_overflow() {
        let cart = Cart::from_lines(vec![
            CartItem { id: 1, name: "A".into(), price: 1.0, quantity: i32::MAX },
            CartItem { id: 2, name: "B".into(), price: 1.0, quantity: 1 },
        ]);
        assert_eq!(cart.totals().total_items, i64::from(i32::MAX) + 1);
    }

    #[test]
    fn test_collapse_lines_merges_repeated_ids() {
        let cart = Cart::collapse_lines(vec![
            CartItem { id: 1, name: "Milk".into(), price: 2.0, quantity: 1 },
            CartItem { id: 2, name: "Bread".into(), price: 3.0, quantity: 2 },
            CartItem { id: 1, name: "Milk".into(), price: 2.0, quantity: 4 },
        ])
        .unwrap();

        assert_eq!(cart.items().iter().map(|i| (i.id, i.quantity)).collect::<Vec<_>>(), vec![(1, 5), (2, 2)]);
        assert_eq!(cart.totals().subtotal, 16.0);
    }

    #[test]
    fn test_collapse_lines_rejects_overflowing_repeats() {
        let err = Cart::collapse_lines(vec![
            CartItem { id: 1, name: "Milk".into(), price: 2.0, quantity: i32::MAX },
            CartItem { id: 1, name: "Milk".into(), price: 2.0, quantity: 1 },
        ])
        .unwrap_err();
        assert_eq!(err, CartError::QuantityOverflow(1));
    }
}
