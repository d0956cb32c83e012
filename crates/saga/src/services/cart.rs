//! Cart service traits and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use common::{Money, ProductId, SkuId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::SagaError;

/// A selected cart line, snapshotted at placement time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub sku_id: SkuId,
    pub product_id: ProductId,
    pub product_name: String,
    pub sku_specs: String,
    pub price: Money,
    pub quantity: u32,
}

impl CartLine {
    /// Returns `price * quantity`, saturating on overflow.
    pub fn subtotal(&self) -> Money {
        self.price.multiply(self.quantity)
    }

    /// Returns `price * quantity`, or `None` if it does not fit in `Money`.
    pub fn checked_subtotal(&self) -> Option<Money> {
        self.price.checked_multiply(self.quantity)
    }
}

/// Reads the lines a user has selected for checkout.
#[async_trait]
pub trait CartSnapshotProvider: Send + Sync {
    /// Returns the currently selected lines for `user_id`.
    async fn selected_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, SagaError>;
}

/// Removes ordered lines from a user's cart.
#[async_trait]
pub trait CartCleanup: Send + Sync {
    /// Removes the lines for the given SKUs.
    async fn clear_lines(&self, user_id: UserId, sku_ids: &[SkuId]) -> Result<(), SagaError>;
}

#[derive(Debug, Clone)]
struct CartEntry {
    line: CartLine,
    selected: bool,
}

#[derive(Debug, Default)]
struct InMemoryCartState {
    carts: HashMap<UserId, Vec<CartEntry>>,
    fail_on_fetch: bool,
    fail_on_clear: bool,
}

/// In-memory cart service for testing and development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartService {
    state: Arc<Mutex<InMemoryCartState>>,
}

impl InMemoryCartService {
    /// Creates a new in-memory cart service.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryCartState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a line to a user's cart, replacing any line for the same SKU.
    pub fn put_line(&self, user_id: UserId, line: CartLine, selected: bool) {
        let mut state = self.state();
        let cart = state.carts.entry(user_id).or_default();
        cart.retain(|e| e.line.sku_id != line.sku_id);
        cart.push(CartEntry { line, selected });
    }

    /// Changes the selected flag of a line. Returns false if the line is absent.
    pub fn set_selected(&self, user_id: UserId, sku_id: SkuId, selected: bool) -> bool {
        let mut state = self.state();
        let entry = state
            .carts
            .get_mut(&user_id)
            .and_then(|cart| cart.iter_mut().find(|e| e.line.sku_id == sku_id));
        match entry {
            Some(entry) => {
                entry.selected = selected;
                true
            }
            None => false,
        }
    }

    /// Returns every line in the user's cart, selected or not.
    pub fn lines(&self, user_id: UserId) -> Vec<CartLine> {
        self.state()
            .carts
            .get(&user_id)
            .map(|cart| cart.iter().map(|e| e.line.clone()).collect())
            .unwrap_or_default()
    }

    /// Configures the service to fail snapshot reads.
    pub fn set_fail_on_fetch(&self, fail: bool) {
        self.state().fail_on_fetch = fail;
    }

    /// Configures the service to fail cleanup calls.
    pub fn set_fail_on_clear(&self, fail: bool) {
        self.state().fail_on_clear = fail;
    }
}

#[async_trait]
impl CartSnapshotProvider for InMemoryCartService {
    async fn selected_lines(&self, user_id: UserId) -> Result<Vec<CartLine>, SagaError> {
        let state = self.state();
        if state.fail_on_fetch {
            return Err(SagaError::CartService("Cart unavailable".to_string()));
        }

        Ok(state
            .carts
            .get(&user_id)
            .map(|cart| {
                cart.iter()
                    .filter(|e| e.selected)
                    .map(|e| e.line.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl CartCleanup for InMemoryCartService {
    async fn clear_lines(&self, user_id: UserId, sku_ids: &[SkuId]) -> Result<(), SagaError> {
        let mut state = self.state();
        if state.fail_on_clear {
            return Err(SagaError::CartService("Cart cleanup failed".to_string()));
        }

        if let Some(cart) = state.carts.get_mut(&user_id) {
            cart.retain(|e| !sku_ids.contains(&e.line.sku_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(sku: i64, quantity: u32) -> CartLine {
        CartLine {
            sku_id: SkuId::new(sku),
            product_id: ProductId::new(sku),
            product_name: format!("Product {sku}"),
            sku_specs: String::new(),
            price: Money::from_cents(100),
            quantity,
        }
    }

    #[tokio::test]
    async fn test_only_selected_lines_are_returned() {
        let cart = InMemoryCartService::new();
        let user = UserId::new(1);
        cart.put_line(user, line(1, 1), true);
        cart.put_line(user, line(2, 1), false);

        let selected = cart.selected_lines(user).await.unwrap();
        assert_eq!(selected, vec![line(1, 1)]);

        assert!(cart.set_selected(user, SkuId::new(2), true));
        assert_eq!(cart.selected_lines(user).await.unwrap().len(), 2);
        assert!(!cart.set_selected(user, SkuId::new(3), true));
    }

    #[tokio::test]
    async fn test_put_line_replaces_same_sku() {
        let cart = InMemoryCartService::new();
        let user = UserId::new(1);
        cart.put_line(user, line(1, 1), true);
        cart.put_line(user, line(1, 4), true);
        assert_eq!(cart.lines(user), vec![line(1, 4)]);
    }

    #[tokio::test]
    async fn test_clear_lines_removes_only_given_skus() {
        let cart = InMemoryCartService::new();
        let user = UserId::new(1);
        cart.put_line(user, line(1, 1), true);
        cart.put_line(user, line(2, 1), false);

        cart.clear_lines(user, &[SkuId::new(1)]).await.unwrap();
        assert_eq!(cart.lines(user), vec![line(2, 1)]);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let cart = InMemoryCartService::new();
        let user = UserId::new(1);
        cart.put_line(user, line(1, 1), true);

        cart.set_fail_on_fetch(true);
        assert!(cart.selected_lines(user).await.is_err());

        cart.set_fail_on_clear(true);
        assert!(cart.clear_lines(user, &[SkuId::new(1)]).await.is_err());
        assert_eq!(cart.lines(user).len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_user_has_empty_cart() {
        let cart = InMemoryCartService::new();
        assert!(cart.selected_lines(UserId::new(9)).await.unwrap().is_empty());
    }
}
