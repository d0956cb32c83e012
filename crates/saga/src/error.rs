//! Saga error types.

use common::{SkuId, UserId};
use domain::{DomainError, OrderError, OrderId, OrderStatus};
use serde::Serialize;
use stock_ledger::StockError;
use thiserror::Error;

/// Coarse classification of a failure, as seen by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The entity does not exist.
    NotFound,
    /// Not enough stock. Terminal for the requested quantity.
    InsufficientStock,
    /// Lost a race. Transient.
    Conflict,
    /// A status-guarded transition was attempted from the wrong status.
    InvalidState,
    /// The caller does not own the entity.
    Unauthorized,
    /// The request itself is malformed or empty.
    InvalidInput,
    /// Persistence or infrastructure failure.
    ServerError,
}

impl ErrorKind {
    /// Returns the kind as a snake_case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::ServerError => "server_error",
        }
    }
}

/// Errors that can occur during placement, cancellation or sweeping.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The user has no selected cart lines.
    #[error("Cart has no selected items")]
    EmptyCart,

    /// A line could not be reserved; everything reserved before it was released.
    #[error("Insufficient stock for {product_name} (SKU {sku_id})")]
    InsufficientStock {
        sku_id: SkuId,
        product_name: String,
        #[source]
        source: StockError,
    },

    /// Line subtotals or the order total do not fit in `Money`.
    #[error("Order amount is out of range")]
    AmountOverflow,

    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order belongs to someone else.
    #[error("Order {order_id} does not belong to user {user_id}")]
    Unauthorized { order_id: OrderId, user_id: UserId },

    /// The order is not in a status that allows the operation.
    #[error("Order {order_id} cannot {action} from {current} state")]
    InvalidState {
        order_id: OrderId,
        current: OrderStatus,
        action: &'static str,
    },

    /// A mandatory step failed on infrastructure; compensation has run.
    #[error("Server error during {step}: {reason}")]
    ServerError { step: &'static str, reason: String },

    /// Cart service error.
    #[error("Cart service error: {0}")]
    CartService(String),

    /// Promotion service error.
    #[error("Promotion service error: {0}")]
    PromotionService(String),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Stock ledger error.
    #[error("Stock error: {0}")]
    Stock(#[from] StockError),
}

impl SagaError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SagaError::EmptyCart | SagaError::AmountOverflow => ErrorKind::InvalidInput,
            SagaError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            SagaError::OrderNotFound(_) => ErrorKind::NotFound,
            SagaError::Unauthorized { .. } => ErrorKind::Unauthorized,
            SagaError::InvalidState { .. } => ErrorKind::InvalidState,
            SagaError::ServerError { .. }
            | SagaError::CartService(_)
            | SagaError::PromotionService(_) => ErrorKind::ServerError,
            SagaError::Domain(DomainError::Order(e)) => match e {
                OrderError::NotFound(_) => ErrorKind::NotFound,
                OrderError::InvalidStateTransition { .. } => ErrorKind::InvalidState,
                OrderError::DuplicateOrderId(_) => ErrorKind::Conflict,
                OrderError::NoLines
                | OrderError::InvalidQuantity { .. }
                | OrderError::InvalidPrice { .. }
                | OrderError::DuplicateLine { .. }
                | OrderError::MissingField(_)
                | OrderError::TooManyLines(_) => ErrorKind::InvalidInput,
            },
            SagaError::Domain(_) => ErrorKind::ServerError,
            SagaError::Stock(e) => match e {
                StockError::NotFound(_) => ErrorKind::NotFound,
                StockError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
                StockError::Conflict { .. } | StockError::ReleaseRejected { .. } => {
                    ErrorKind::Conflict
                }
                StockError::InvalidQuantity(_) | StockError::AlreadyExists(_) => {
                    ErrorKind::InvalidInput
                }
                StockError::InvalidRecord { .. }
                | StockError::Database(_)
                | StockError::Migration(_) => ErrorKind::ServerError,
            },
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_are_classified() {
        let err = SagaError::from(DomainError::from(OrderError::InvalidStateTransition {
            order_id: OrderId::new("SN1"),
            current: OrderStatus::Paid,
            action: "cancel",
        }));
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err = SagaError::from(DomainError::Unavailable("down".to_string()));
        assert_eq!(err.kind(), ErrorKind::ServerError);
    }

    #[test]
    fn stock_errors_are_classified() {
        let err = SagaError::from(StockError::Conflict {
            sku_id: SkuId::new(1),
            observed: stock_ledger::Version::new(3),
            attempts: 5,
        });
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(
            SagaError::from(StockError::NotFound(SkuId::new(1))).kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn insufficient_stock_names_the_product() {
        let err = SagaError::InsufficientStock {
            sku_id: SkuId::new(2),
            product_name: "Gadget".to_string(),
            source: StockError::InsufficientStock {
                sku_id: SkuId::new(2),
                requested: 1,
                available: 0,
            },
        };
        assert_eq!(err.to_string(), "Insufficient stock for Gadget (SKU 2)");
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    }
}
