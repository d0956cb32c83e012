//! Collaborator service traits and in-memory implementations.

pub mod cart;
pub mod promotion;

pub use cart::{CartCleanup, CartLine, CartSnapshotProvider, InMemoryCartService};
pub use promotion::{
    Coupon, CouponLedger, Discount, DiscountCalculator, InMemoryPromotionService,
};
