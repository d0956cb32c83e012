//! Order identifiers.

use chrono::{DateTime, Utc};
use common::UserId;
use serde::{Deserialize, Serialize};

/// Globally unique order identifier.
///
/// Generated ids look like `SN20240131120501` + the last four digits of the
/// user id, e.g. `SN202401311205010042`. Two orders by users sharing the same
/// last four digits within the same second collide; the store's primary key
/// catches that and callers regenerate with [`OrderId::with_nonce`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Wraps an existing order id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates the time-based id for an order placed by `user_id` at `now`.
    pub fn generate(now: DateTime<Utc>, user_id: UserId) -> Self {
        Self(format!(
            "SN{}{:04}",
            now.format("%Y%m%d%H%M%S"),
            user_id.as_i64().rem_euclid(10_000)
        ))
    }

    /// Returns a copy of this id with a 4-digit disambiguating suffix.
    pub fn with_nonce(&self, nonce: u16) -> Self {
        Self(format!("{}{:04}", self.0, nonce % 10_000))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for OrderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
