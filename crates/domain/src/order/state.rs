//! Order status state machine.

use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Paid ──► Shipped ──► Completed
///           │
///           └──► Cancelled
/// ```
///
/// Every transition is guarded on the source status; a transition attempted
/// from any other status is rejected, never ignored. Status never regresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Created, stock reserved, awaiting payment.
    #[default]
    Pending,

    /// Payment confirmed.
    Paid,

    /// Handed to fulfillment.
    Shipped,

    /// Received by the customer (terminal state).
    Completed,

    /// Cancelled before payment (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns the persisted numeric code.
    pub fn code(&self) -> i16 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Paid => 1,
            OrderStatus::Shipped => 2,
            OrderStatus::Completed => 3,
            OrderStatus::Cancelled => 4,
        }
    }

    /// Parses a persisted numeric code.
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(OrderStatus::Pending),
            1 => Some(OrderStatus::Paid),
            2 => Some(OrderStatus::Shipped),
            3 => Some(OrderStatus::Completed),
            4 => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Returns true if a payment can be recorded in this status.
    pub fn can_pay(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the order can be cancelled in this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the order can be shipped in this status.
    pub fn can_ship(&self) -> bool {
        matches!(self, OrderStatus::Paid)
    }

    /// Returns true if the order can be completed in this status.
    pub fn can_complete(&self) -> bool {
        matches!(self, OrderStatus::Shipped)
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Returns the only status from which `self` can be entered, together
    /// with the action name used in errors. `Pending` has no source.
    pub fn required_source(&self) -> Option<(OrderStatus, &'static str)> {
        match self {
            OrderStatus::Pending => None,
            OrderStatus::Paid => Some((OrderStatus::Pending, "pay")),
            OrderStatus::Shipped => Some((OrderStatus::Paid, "ship")),
            OrderStatus::Completed => Some((OrderStatus::Shipped, "complete")),
            OrderStatus::Cancelled => Some((OrderStatus::Pending, "cancel")),
        }
    }

    /// Returns true if `self -> to` is an edge of the state machine.
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        to.required_source()
            .is_some_and(|(source, _)| source == *self)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Paid => "Paid",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
