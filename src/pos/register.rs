// src/pos/register.rs
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::cart::Cart;

/// Open carts, one per cashier (keyed by user id).
#[derive(Clone, Default)]
pub struct Register {
    carts: Arc<RwLock<HashMap<i64, Cart>>>,
}

impl Register {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the cashier's cart; an empty cart when none is open.
    pub async fn snapshot(&self, user_id: i64) -> Cart {
        self.carts.read().await.get(&user_id).cloned().unwrap_or_default()
    }

    /// Runs `f` against the cashier's cart under the write lock, creating the
    /// cart on first use. Empty carts are dropped afterwards.
    pub async fn with_cart<T, F>(&self, user_id: i64, f: F) -> T
    where
        F: FnOnce(&mut Cart) -> T,
    {
        let mut carts = self.carts.write().await;
        let cart = carts.entry(user_id).or_default();
        let out = f(cart);
        if cart.is_empty() && cart.adjustments() == Default::default() {
            carts.remove(&user_id);
        }
        out
    }

    /// Removes the cart for checkout. A second concurrent checkout sees an
    /// empty cart.
    pub async fn take(&self, user_id: i64) -> Cart {
        self.carts.write().await.remove(&user_id).unwrap_or_default()
    }

    /// Puts a cart back after a failed checkout. Lines the cashier added in the
    /// meantime are kept on top of the restored ones; if the sum would
    /// overflow a line, the newer cart stays as it is.
    pub async fn restore(&self, user_id: i64, cart: Cart) {
        if cart == Cart::default() {
            return;
        }
        let mut carts = self.carts.write().await;
        match carts.remove(&user_id) {
            None => {
                carts.insert(user_id, cart);
            }
            Some(newer) => {
                let mut merged = cart;
                match merged.merge_lines(&newer) {
                    Ok(()) => carts.insert(user_id, merged),
                    Err(e) => {
                        tracing::warn!(user_id, error = %e, "Could not restore cart");
                        carts.insert(user_id, newer)
                    }
                };
            }
        }
    }

    pub async fn clear(&self, user_id: i64) {
        self.carts.write().await.remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pos::cart::{Adjustments, CartItem};

    fn line(id: i64, quantity: i32) -> CartItem {
        CartItem { id, name: format!("Item {id}"), price: 2.0, quantity }
    }

    #[tokio::test]
    async fn test_carts_are_isolated_per_cashier() {
        let register = Register::new();
        register
            .with_cart(1, |cart| cart.merge_lines(&Cart::from_lines(vec![line(10, 1)])))
            .await
            .unwrap();

        assert_eq!(register.snapshot(1).await.items().len(), 1);
        assert!(register.snapshot(2).await.is_empty());
    }

    #[tokio::test]
    async fn test_take_leaves_empty_cart() {
        let register = Register::new();
        register
            .with_cart(1, |cart| cart.merge_lines(&Cart::from_lines(vec![line(10, 2)])))
            .await
            .unwrap();

        let taken = register.take(1).await;
        assert_eq!(taken.items()[0].quantity, 2);
        assert!(register.take(1).await.is_empty());
    }

    #[tokio::test]
    async fn test_restore_merges_lines_added_meanwhile() {
        let register = Register::new();
        register
            .with_cart(1, |cart| {
                cart.merge_lines(&Cart::from_lines(vec![line(10, 2)])).unwrap();
                cart.set_adjustments(Adjustments { tax: 1.0, shipping: 0.0, discount: 0.0 })
            })
            .await
            .unwrap();

        let taken = register.take(1).await;
        register
            .with_cart(1, |cart| cart.merge_lines(&Cart::from_lines(vec![line(10, 1), line(11, 1)])))
            .await
            .unwrap();
        register.restore(1, taken).await;

        let cart = register.snapshot(1).await;
        assert_eq!(cart.get(10).map(|l| l.quantity), Some(3));
        assert_eq!(cart.get(11).map(|l| l.quantity), Some(1));
        assert_eq!(cart.adjustments().tax, 1.0);
    }

    #[tokio::test]
    async fn test_emptied_cart_is_dropped() {
        let register = Register::new();
        register
            .with_cart(1, |cart| cart.merge_lines(&Cart::from_lines(vec![line(10, 1)])))
            .await
            .unwrap();
        register
            .with_cart(1, |cart| cart.update_quantity(10, 0).map(|_| ()))
            .await
            .unwrap();

        assert!(register.carts.read().await.get(&1).is_none());
    }

    #[tokio::test]
    async fn test_restore_keeps_newer_cart_on_overflow() {
        let register = Register::new();
        register
            .with_cart(1, |cart| cart.merge_lines(&Cart::from_lines(vec![line(10, i32::MAX)])))
            .await
            .unwrap();

        let taken = register.take(1).await;
        register
            .with_cart(1, |cart| cart.merge_lines(&Cart::from_lines(vec![line(10, 1)])))
            .await
            .unwrap();
        register.restore(1, taken).await;

        let cart = register.snapshot(1).await;
        assert_eq!(cart.get(10).map(|l| l.quantity), Some(1));
    }
}
