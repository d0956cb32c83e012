use thiserror::Error;

use crate::{SkuId, Version};

/// Errors that can occur when reading or mutating stock.
#[derive(Debug, Error)]
pub enum StockError {
    /// No stock record exists for the SKU.
    #[error("Stock record not found for SKU {0}")]
    NotFound(SkuId),

    /// A stock record for the SKU was already provisioned.
    #[error("Stock record already exists for SKU {0}")]
    AlreadyExists(SkuId),

    /// Not enough available stock. Terminal for this quantity.
    #[error("Insufficient stock for SKU {sku_id}: requested {requested}, available {available}")]
    InsufficientStock {
        sku_id: SkuId,
        requested: u32,
        available: u32,
    },

    /// The version guard kept rejecting the write because other writers won
    /// the race. Transient.
    #[error(
        "Concurrency conflict for SKU {sku_id}: last observed version {observed} after {attempts} attempt(s)"
    )]
    Conflict {
        sku_id: SkuId,
        observed: Version,
        attempts: u32,
    },

    /// A release asked for more than is currently locked.
    #[error("Cannot release {requested} unit(s) of SKU {sku_id}: only {locked} locked")]
    ReleaseRejected {
        sku_id: SkuId,
        requested: u32,
        locked: u32,
    },

    /// The quantity is zero or does not fit the 32-bit counters.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(u32),

    /// A persisted row violates the record invariants.
    #[error("Invalid stock record for SKU {sku_id}: {reason}")]
    InvalidRecord { sku_id: SkuId, reason: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StockError {
    /// Returns true for failures caused by losing a race or by a guard
    /// rejecting the write, as opposed to missing data or infrastructure.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StockError::Conflict { .. } | StockError::ReleaseRejected { .. }
        )
    }
}

/// Result type for stock ledger operations.
pub type Result<T> = std::result::Result<T, StockError>;
