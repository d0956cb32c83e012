//! Numeric identifiers for entities owned by collaborating services.
//!
//! Users, SKUs, products, coupons and addresses are all keyed by 64-bit
//! integers in their owning services. Each gets its own newtype so a SKU id
//! can never be passed where a product id is expected.

use serde::{Deserialize, Serialize};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw identifier.
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw identifier.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

numeric_id!(
    /// Identifier of an authenticated user.
    UserId
);

numeric_id!(
    /// Identifier of a stock-keeping unit; the key of the stock ledger.
    SkuId
);

numeric_id!(
    /// Identifier of a catalog product. Several SKUs may share one product.
    ProductId
);

numeric_id!(
    /// Identifier of a coupon issued by the promotion service.
    CouponId
);

numeric_id!(
    /// Identifier of an address book entry.
    AddressId
);

impl CouponId {
    /// Returns true if this refers to a real coupon.
    ///
    /// Callers historically send `0` to mean "no coupon".
    pub fn is_present(&self) -> bool {
        self.0 > 0
    }
}
