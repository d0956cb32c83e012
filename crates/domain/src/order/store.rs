//! Order persistence trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::UserId;
use serde::{Deserialize, Serialize};

use super::{Order, OrderHeader, OrderId, OrderStatus};
use crate::Result;

/// One page of a listing, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    /// Largest page size served.
    pub const MAX_SIZE: u32 = 100;

    /// Creates a page request, clamping page to at least 1 and size to
    /// `1..=MAX_SIZE`.
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page: page.max(1),
            size: size.clamp(1, Self::MAX_SIZE),
        }
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

/// Storage backend for orders.
///
/// An order's header and lines are written as one unit. The status column is
/// only ever changed through [`OrderStore::transition_status`], which applies
/// the write only if the current status equals `from`.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order. Fails with `DuplicateOrderId` if the id is taken;
    /// nothing is written in that case.
    async fn insert(&self, order: &Order) -> Result<()>;

    /// Loads an order with its lines.
    async fn get(&self, order_id: &OrderId) -> Result<Option<Order>>;

    /// Sets `status = to` if and only if the current status is `from`.
    ///
    /// Returns `false` when the guard did not match or the order is missing.
    /// `reason` is recorded as the cancel reason when given.
    async fn transition_status(
        &self,
        order_id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
        reason: Option<&str>,
    ) -> Result<bool>;

    /// Returns up to `limit` Pending orders whose expire time is at or
    /// before `now`, oldest expiry first.
    async fn find_expired(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<OrderHeader>>;

    /// Lists a user's orders, newest first, optionally filtered by status.
    async fn list_for_user(
        &self,
        user_id: UserId,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Vec<OrderHeader>>;
}
