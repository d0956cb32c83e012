//! Stock ledger with optimistic concurrency control.
//!
//! Every SKU has one [`StockRecord`] holding `total`, `available` and
//! `locked` counters plus a [`Version`]. Reservations move quantity from
//! `available` to `locked`; releases move it back. Both are conditional
//! writes: no lock is held between reading a record and updating it, so a
//! stale writer is detected by the guard and rejected.
//!
//! Heavy contention on a single SKU degrades into repeated conflicts (the
//! hot-row problem). The [`StockLedger`] retries a bounded number of times
//! according to its [`RetryPolicy`] and then gives up with
//! [`StockError::Conflict`].

pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod retry;
pub mod store;

pub use common::SkuId;
pub use error::{Result, StockError};
pub use ledger::StockLedger;
pub use memory::InMemoryStockStore;
pub use postgres::PostgresStockStore;
pub use record::{MAX_QUANTITY, StockRecord, Version};
pub use retry::RetryPolicy;
pub use store::{GuardOutcome, StockStore};
