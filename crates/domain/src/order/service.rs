//! Order service providing the status-change and query API.

use chrono::{DateTime, Utc};
use common::UserId;
use tracing::{info, warn};

use super::{Order, OrderError, OrderHeader, OrderId, OrderStatus, OrderStore, PageRequest};
use crate::Result;

/// Service for managing persisted orders.
///
/// Every status change goes through the store's guarded transition. When the
/// guard rejects, the service re-reads the order so callers can tell a
/// missing order from one that is in the wrong status.
pub struct OrderService<S: OrderStore> {
    store: S,
}

impl<S: OrderStore> OrderService<S> {
    /// Creates a new order service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persists a freshly built order.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id()))]
    pub async fn create_order(&self, order: &Order) -> Result<()> {
        self.store.insert(order).await?;
        info!(
            user_id = %order.user_id(),
            lines = order.line_count(),
            pay_amount = %order.pay_amount(),
            "Order persisted"
        );
        Ok(())
    }

    /// Loads an order with its lines.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: &OrderId) -> Result<Order> {
        self.store
            .get(order_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(order_id.clone()).into())
    }

    /// Moves an order to `status` from the one status that may precede it.
    ///
    /// This is the payment-callback boundary: calling it twice with `Paid`
    /// succeeds once and then fails with `InvalidStateTransition`.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(&self, order_id: &OrderId, status: OrderStatus) -> Result<()> {
        let Some((from, action)) = status.required_source() else {
            let current = self.get_order(order_id).await?.status();
            return Err(OrderError::InvalidStateTransition {
                order_id: order_id.clone(),
                current,
                action: "reopen",
            }
            .into());
        };
        self.transition(order_id, from, status, action, None).await
    }

    /// Records a payment (Pending → Paid).
    pub async fn mark_paid(&self, order_id: &OrderId) -> Result<()> {
        self.update_status(order_id, OrderStatus::Paid).await
    }

    /// Hands a paid order to fulfillment (Paid → Shipped).
    pub async fn ship(&self, order_id: &OrderId) -> Result<()> {
        self.update_status(order_id, OrderStatus::Shipped).await
    }

    /// Marks a shipped order as received (Shipped → Completed).
    pub async fn complete(&self, order_id: &OrderId) -> Result<()> {
        self.update_status(order_id, OrderStatus::Completed).await
    }

    /// Cancels a Pending order, recording `reason`.
    ///
    /// Does not touch stock; releasing the reserved lines is the caller's job
    /// and must only happen when this returns `Ok`.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_pending(&self, order_id: &OrderId, reason: &str) -> Result<()> {
        self.transition(
            order_id,
            OrderStatus::Pending,
            OrderStatus::Cancelled,
            "cancel",
            Some(reason),
        )
        .await
    }

    /// Lists a user's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Vec<OrderHeader>> {
        self.store.list_for_user(user_id, status, page).await
    }

    /// Returns up to `limit` Pending orders past their expire time.
    pub async fn find_expired(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<OrderHeader>> {
        self.store.find_expired(now, limit).await
    }

    async fn transition(
        &self,
        order_id: &OrderId,
        from: OrderStatus,
        to: OrderStatus,
        action: &'static str,
        reason: Option<&str>,
    ) -> Result<()> {
        if self
            .store
            .transition_status(order_id, from, to, reason)
            .await?
        {
            metrics::counter!("order_status_transitions_total", "to" => to.as_str())
                .increment(1);
            info!(%order_id, %from, %to, "Order status changed");
            return Ok(());
        }

        let current = self.get_order(order_id).await?.status();
        warn!(%order_id, %current, action, "Status transition rejected");
        Err(OrderError::InvalidStateTransition {
            order_id: order_id.clone(),
            current,
            action,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use common::{Money, ProductId, SkuId};

    use super::*;
    use crate::DomainError;
    use crate::order::{InMemoryOrderStore, OrderLine};

    async fn service_with_order() -> (OrderService<InMemoryOrderStore>, OrderId) {
        let service = OrderService::new(InMemoryOrderStore::new());
        let order = Order::builder()
            .order_id(OrderId::new("SN-TEST"))
            .user_id(UserId::new(42))
            .line(OrderLine {
                sku_id: SkuId::new(1),
                product_id: ProductId::new(10),
                product_name: "Widget".to_string(),
                sku_specs: String::new(),
                price: Money::from_cents(1000),
                quantity: 2,
            })
            .build()
            .unwrap();
        service.create_order(&order).await.unwrap();
        (service, order.id().clone())
    }

    fn assert_invalid_transition(err: DomainError, expected_current: OrderStatus) {
        match err {
            DomainError::Order(OrderError::InvalidStateTransition { current, .. }) => {
                assert_eq!(current, expected_current)
            }
            other => panic!("expected InvalidStateTransition, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_full_fulfillment_path() {
        let (service, id) = service_with_order().await;

        service.mark_paid(&id).await.unwrap();
        service.ship(&id).await.unwrap();
        service.complete(&id).await.unwrap();

        assert_eq!(
            service.get_order(&id).await.unwrap().status(),
            OrderStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_duplicate_payment_callback_is_rejected() {
        let (service, id) = service_with_order().await;

        service.update_status(&id, OrderStatus::Paid).await.unwrap();
        let err = service
            .update_status(&id, OrderStatus::Paid)
            .await
            .unwrap_err();
        assert_invalid_transition(err, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_late_payment_cannot_reopen_cancelled_order() {
        let (service, id) = service_with_order().await;

        service.cancel_pending(&id, "changed my mind").await.unwrap();
        let err = service.mark_paid(&id).await.unwrap_err();
        assert_invalid_transition(err, OrderStatus::Cancelled);

        let order = service.get_order(&id).await.unwrap();
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert_eq!(
            order.header.cancel_reason.as_deref(),
            Some("changed my mind")
        );
    }

    #[tokio::test]
    async fn test_ship_requires_paid() {
        let (service, id) = service_with_order().await;
        let err = service.ship(&id).await.unwrap_err();
        assert_invalid_transition(err, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_cannot_move_back_to_pending() {
        let (service, id) = service_with_order().await;
        let err = service
            .update_status(&id, OrderStatus::Pending)
            .await
            .unwrap_err();
        assert_invalid_transition(err, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_missing_order_is_not_found() {
        let service = OrderService::new(InMemoryOrderStore::new());
        let err = service
            .mark_paid(&OrderId::new("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Order(OrderError::NotFound(_))));
    }
}
