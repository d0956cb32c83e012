//! Domain layer for order placement.
//!
//! This crate provides:
//! - The order aggregate (header + lines) and its pricing rules
//! - The order status state machine with guarded transitions
//! - The `OrderStore` persistence trait with in-memory and PostgreSQL backends
//! - `OrderService`, the entry point for status changes and order queries

pub mod error;
pub mod order;

pub use common::{AddressId, CouponId, Money, ProductId, SkuId, UserId};
pub use error::{DomainError, Result};
pub use order::{
    AddressSnapshot, DEFAULT_ORDER_TTL_MINUTES, InMemoryOrderStore, Order, OrderBuilder,
    OrderError, OrderHeader, OrderId, OrderLine, OrderService, OrderStatus, OrderStore,
    PageRequest, PostgresOrderStore, Pricing,
};
