//! Shared identifiers and value types used across the workspace.

pub mod ids;
pub mod money;

pub use ids::{AddressId, CouponId, ProductId, SkuId, UserId};
pub use money::Money;
