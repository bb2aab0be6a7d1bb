use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored state of one lease. Serialized as JSON in the lock bucket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LockRecord {
    pub key: String,
    pub owner: String,
    /// Set when the lease is first claimed; refreshing keeps it.
    pub created_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl LockRecord {
    /// A lease is active strictly until `valid_until`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.valid_until > now
    }
}
