//! Order aggregate and related types.

mod id;
mod memory;
mod postgres;
mod service;
mod state;
mod store;
mod value_objects;

pub use id::OrderId;
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use service::OrderService;
pub use state::OrderStatus;
pub use store::{OrderStore, PageRequest};
pub use value_objects::{
    AddressSnapshot, DEFAULT_ORDER_TTL_MINUTES, Order, OrderBuilder, OrderHeader, OrderLine,
    Pricing,
};

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// No order with this id exists.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The order is not in the state the transition requires.
    #[error("Invalid state transition for order {order_id}: cannot {action} from {current} state")]
    InvalidStateTransition {
        order_id: OrderId,
        current: OrderStatus,
        action: &'static str,
    },

    /// An order with this id was already persisted.
    #[error("Duplicate order id: {0}")]
    DuplicateOrderId(OrderId),

    /// An order must carry at least one line.
    #[error("Order has no lines")]
    NoLines,

    /// Invalid quantity.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Invalid price.
    #[error("Invalid price: {price} (must not be negative)")]
    InvalidPrice { price: i64 },

    /// The same SKU appears on two lines.
    #[error("Duplicate line for SKU {sku_id}")]
    DuplicateLine { sku_id: common::SkuId },

    /// A required builder field was not set.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// More lines than the line number column can hold.
    #[error("Order has too many lines: {0}")]
    TooManyLines(usize),
}
