//! Integration tests for order persistence and the status state machine.

use chrono::{Duration, Utc};
use domain::{
    AddressId, AddressSnapshot, CouponId, DomainError, InMemoryOrderStore, Money, Order,
    OrderError, OrderId, OrderLine, OrderService, OrderStatus, PageRequest, Pricing, ProductId,
    SkuId, UserId,
};

fn create_service() -> OrderService<InMemoryOrderStore> {
    OrderService::new(InMemoryOrderStore::new())
}

fn line(sku: i64, name: &str, price: i64, quantity: u32) -> OrderLine {
    OrderLine {
        sku_id: SkuId::new(sku),
        product_id: ProductId::new(sku * 10),
        product_name: name.to_string(),
        sku_specs: "{\"color\":\"blue\"}".to_string(),
        price: Money::from_cents(price),
        quantity,
    }
}

fn two_line_order(id: &str, user: i64) -> Order {
    Order::builder()
        .order_id(OrderId::new(id))
        .user_id(UserId::new(user))
        .address_snapshot(AddressSnapshot::from_address_id(AddressId::new(3)))
        .line(line(1, "Widget A", 10, 2))
        .line(line(2, "Widget B", 5, 1))
        .build()
        .unwrap()
}

mod order_lifecycle {
    use super::*;

    #[tokio::test]
    async fn create_and_load_round_trip() {
        let service = create_service();
        let order = two_line_order("SN-1", 1);
        service.create_order(&order).await.unwrap();

        let loaded = service.get_order(order.id()).await.unwrap();
        assert_eq!(loaded.status(), OrderStatus::Pending);
        assert_eq!(loaded.line_count(), 2);
        assert_eq!(loaded.header.pricing.total_amount, Money::from_cents(25));
        assert_eq!(loaded.pay_amount(), Money::from_cents(25));
        assert_eq!(loaded.lines[0].product_name, "Widget A");
        assert_eq!(loaded.lines[1].quantity, 1);
    }

    #[tokio::test]
    async fn complete_order_lifecycle() {
        let service = create_service();
        let order = two_line_order("SN-2", 1);
        service.create_order(&order).await.unwrap();
        let id = order.id();

        for (status, expected) in [
            (OrderStatus::Paid, OrderStatus::Paid),
            (OrderStatus::Shipped, OrderStatus::Shipped),
            (OrderStatus::Completed, OrderStatus::Completed),
        ] {
            service.update_status(id, status).await.unwrap();
            assert_eq!(service.get_order(id).await.unwrap().status(), expected);
        }

        // Terminal: nothing moves a completed order.
        for status in [
            OrderStatus::Paid,
            OrderStatus::Shipped,
            OrderStatus::Cancelled,
        ] {
            assert!(service.update_status(id, status).await.is_err());
        }
    }

    #[tokio::test]
    async fn discounted_pricing_is_persisted() {
        let service = create_service();
        let order = Order::builder()
            .order_id(OrderId::new("SN-3"))
            .user_id(UserId::new(1))
            .coupon_id(CouponId::new(5))
            .pricing(Pricing::new(
                Money::from_cents(6000),
                Money::from_cents(1000),
                Money::zero(),
            ))
            .line(line(1, "Widget A", 3000, 2))
            .build()
            .unwrap();
        service.create_order(&order).await.unwrap();

        let loaded = service.get_order(order.id()).await.unwrap();
        assert_eq!(loaded.header.coupon_id, Some(CouponId::new(5)));
        assert_eq!(loaded.pay_amount(), Money::from_cents(5000));
    }
}

mod guarded_transitions {
    use super::*;

    #[tokio::test]
    async fn paid_order_cannot_be_cancelled() {
        let service = create_service();
        let order = two_line_order("SN-4", 1);
        service.create_order(&order).await.unwrap();
        service.mark_paid(order.id()).await.unwrap();

        let err = service
            .cancel_pending(order.id(), "too late")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::InvalidStateTransition {
                current: OrderStatus::Paid,
                action: "cancel",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn racing_payment_and_cancel_have_one_winner() {
        let service = std::sync::Arc::new(create_service());
        let order = two_line_order("SN-5", 1);
        service.create_order(&order).await.unwrap();

        let pay = {
            let service = service.clone();
            let id = order.id().clone();
            tokio::spawn(async move { service.mark_paid(&id).await })
        };
        let cancel = {
            let service = service.clone();
            let id = order.id().clone();
            tokio::spawn(async move { service.cancel_pending(&id, "expired").await })
        };

        let paid = pay.await.unwrap().is_ok();
        let cancelled = cancel.await.unwrap().is_ok();
        assert!(paid ^ cancelled);

        let status = service.get_order(order.id()).await.unwrap().status();
        assert_eq!(
            status,
            if paid {
                OrderStatus::Paid
            } else {
                OrderStatus::Cancelled
            }
        );
    }

    #[tokio::test]
    async fn duplicate_id_is_reported() {
        let service = create_service();
        service
            .create_order(&two_line_order("SN-6", 1))
            .await
            .unwrap();
        let err = service
            .create_order(&two_line_order("SN-6", 2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Order(OrderError::DuplicateOrderId(_))
        ));
    }
}

mod queries {
    use super::*;

    #[tokio::test]
    async fn list_filters_by_status() {
        let service = create_service();
        for i in 0..3 {
            service
                .create_order(&two_line_order(&format!("SN-L{i}"), 9))
                .await
                .unwrap();
        }
        service.mark_paid(&OrderId::new("SN-L1")).await.unwrap();

        let pending = service
            .list_for_user(
                UserId::new(9),
                Some(OrderStatus::Pending),
                PageRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);

        let all = service
            .list_for_user(UserId::new(9), None, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let none = service
            .list_for_user(UserId::new(10), None, PageRequest::default())
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn find_expired_skips_paid_orders() {
        let service = create_service();
        let past = Utc::now() - Duration::hours(1);
        for id in ["SN-E1", "SN-E2"] {
            let order = Order::builder()
                .order_id(OrderId::new(id))
                .user_id(UserId::new(1))
                .line(line(1, "Widget A", 10, 1))
                .created_at(past)
                .ttl(Duration::minutes(30))
                .build()
                .unwrap();
            service.create_order(&order).await.unwrap();
        }
        service.mark_paid(&OrderId::new("SN-E2")).await.unwrap();

        let expired = service.find_expired(Utc::now(), 100).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].order_id, OrderId::new("SN-E1"));
    }
}
