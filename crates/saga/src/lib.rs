//! Saga orchestration for order placement.
//!
//! This crate coordinates the stock ledger, the order store and the cart and
//! promotion collaborators without a shared transaction:
//!
//! - [`OrderPlacementOrchestrator`] reserves stock line by line, persists the
//!   order and fires best-effort side effects. A failure while reserving or
//!   persisting releases everything reserved so far.
//! - [`OrderCancellationHandler`] cancels a Pending order and releases its
//!   lines.
//! - [`ExpiredOrderSweeper`] does the same for orders nobody paid in time.
//!
//! Coupon redemption and cart cleanup are never rolled back.

pub mod cancellation;
pub mod compensation;
pub mod error;
pub mod order_placement;
pub mod placement;
pub mod services;
pub mod sweeper;

pub use cancellation::{Cancellation, OrderCancellationHandler};
pub use compensation::ReservedLines;
pub use error::{ErrorKind, Result, SagaError};
pub use placement::{OrderPlacementOrchestrator, OrderResult, PlacementConfig};
pub use services::{
    CartCleanup, CartLine, CartSnapshotProvider, Coupon, CouponLedger, Discount,
    DiscountCalculator, InMemoryCartService, InMemoryPromotionService,
};
pub use sweeper::{EXPIRED_REASON, ExpiredOrderSweeper};
