use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Result, SkuId, StockError};

/// Largest quantity accepted by the ledger; counters are 32-bit signed in storage.
pub const MAX_QUANTITY: u32 = i32::MAX as u32;

/// Version number of a stock record, used for optimistic concurrency control.
///
/// A freshly provisioned record starts at 0 and every successful reserve or
/// release increments it by exactly 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) of a new record.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Stock counters for one SKU.
///
/// `available + locked <= total` holds for every record the ledger hands
/// out. `total` never changes after provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub sku_id: SkuId,
    pub total: u32,
    pub available: u32,
    pub locked: u32,
    pub version: Version,
    pub updated_at: DateTime<Utc>,
}

impl StockRecord {
    /// Creates a record for newly provisioned stock: everything available,
    /// nothing locked, version 0.
    pub fn provision(sku_id: SkuId, total: u32) -> Self {
        Self {
            sku_id,
            total,
            available: total,
            locked: 0,
            version: Version::initial(),
            updated_at: Utc::now(),
        }
    }

    /// Returns true if `quantity` units can be reserved right now.
    pub fn can_reserve(&self, quantity: u32) -> bool {
        self.available >= quantity
    }

    /// Returns true if `quantity` units can be released right now.
    pub fn can_release(&self, quantity: u32) -> bool {
        self.locked >= quantity
    }

    /// Checks the counter invariant.
    pub fn validate(&self) -> Result<()> {
        if self.total > MAX_QUANTITY {
            return Err(StockError::InvalidRecord {
                sku_id: self.sku_id,
                reason: format!("total {} exceeds {}", self.total, MAX_QUANTITY),
            });
        }
        if u64::from(self.available) + u64::from(self.locked) > u64::from(self.total) {
            return Err(StockError::InvalidRecord {
                sku_id: self.sku_id,
                reason: format!(
                    "available {} + locked {} exceeds total {}",
                    self.available, self.locked, self.total
                ),
            });
        }
        Ok(())
    }
}
