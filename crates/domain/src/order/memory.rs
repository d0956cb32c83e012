//! In-memory order store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::UserId;
use tokio::sync::RwLock;

use super::{Order, OrderError, OrderHeader, OrderId, OrderStatus, OrderStore, PageRequest};
use crate::{DomainError, Result};

#[derive(Default)]
struct StoreState {
    orders: HashMap<OrderId, Order>,
    fail_on_insert: bool,
}

/// In-memory order store.
///
/// Useful for testing and development. The status guard is checked and
/// applied under a single write lock.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the store to fail every insert.
    pub async fn set_fail_on_insert(&self, fail: bool) {
        self.state.write().await.fail_on_insert = fail;
    }

    /// Returns the number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Removes all orders.
    pub async fn clear(&self) {
        self.state.write().await.orders.clear();
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_insert {
            return Err(DomainError::Unavailable(
                "simulated order store failure".to_string(),
            ));
        }

        let order_id = order.id().clone();
        if state.orders.contains_key(&order_id) {
            return Err(OrderError::DuplicateOrderId(order_id).into());
        }
        state.orders.insert(order_id, order.clone());
        Ok(())
    }

    async fn get(&self, order_id: &OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(order_id).cloned())
    }

    async fn transition_status(
        &self,
        order_id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
        reason: Option<&str>,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(order) = state.orders.get_mut(order_id) else {
            return Ok(false);
        };
        if order.header.status != from {
            return Ok(false);
        }

        order.header.status = to;
        order.header.update_time = Utc::now();
        if let Some(reason) = reason {
            order.header.cancel_reason = Some(reason.to_string());
        }
        Ok(true)
    }

    async fn find_expired(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<OrderHeader>> {
        let state = self.state.read().await;
        let mut expired: Vec<OrderHeader> = state
            .orders
            .values()
            .filter(|o| o.header.is_expired(now))
            .map(|o| o.header.clone())
            .collect();
        expired.sort_by(|a, b| {
            a.expire_time
                .cmp(&b.expire_time)
                .then_with(|| a.order_id.cmp(&b.order_id))
        });
        expired.truncate(limit);
        Ok(expired)
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Vec<OrderHeader>> {
        let state = self.state.read().await;
        let mut headers: Vec<OrderHeader> = state
            .orders
            .values()
            .filter(|o| o.header.user_id == user_id)
            .filter(|o| status.is_none_or(|s| o.header.status == s))
            .map(|o| o.header.clone())
            .collect();
        headers.sort_by(|a, b| {
            b.create_time
                .cmp(&a.create_time)
                .then_with(|| b.order_id.cmp(&a.order_id))
        });

        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        Ok(headers
            .into_iter()
            .skip(offset)
            .take(page.size as usize)
            .collect())
    }
}
