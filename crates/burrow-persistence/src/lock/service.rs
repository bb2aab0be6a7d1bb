//! Lease claim and release over the substrate.
//!
//! Claim and release run under a process-wide mutex so the decide-then-write
//! sequence for one call is never interleaved with another. The substrate's
//! single-writer transactions make each mutation atomic on disk; the mutex
//! makes the read-decide-write sequence atomic in memory.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::StoreError;
use crate::lock::model::LockRecord;
use crate::store::{BucketId, LOCKS_BUCKET, Substrate, WriteTxn};

/// TTL-leased lock registry.
pub struct LockService<S: Substrate> {
    substrate: Arc<S>,
    default_ttl: Duration,
    guard: Mutex<()>,
}

impl<S: Substrate> LockService<S> {
    /// `default_ttl` applies when a claim carries no explicit lease duration.
    pub fn new(substrate: Arc<S>, default_ttl: Duration) -> Self {
        LockService {
            substrate,
            default_ttl,
            guard: Mutex::new(()),
        }
    }

    /// Claims or refreshes the lease named `key` for `owner`.
    ///
    /// Returns the current record and whether the claim was granted:
    /// - no record: a fresh lease is written, granted
    /// - active lease held by `owner`: `valid_until` is extended, `created_at`
    ///   kept, granted
    /// - active lease held by someone else: nothing is written, denied, the
    ///   holder's record is returned
    /// - expired lease: overwritten as a fresh lease, granted
    pub fn claim(
        &self,
        key: &str,
        owner: &str,
        ttl: Option<Duration>,
    ) -> Result<(LockRecord, bool), StoreError> {
        let _guard = self.guard.lock();
        let now = Utc::now();
        let ttl = ttl.unwrap_or(self.default_ttl);

        let mut txn = self.substrate.begin_write()?;
        let bucket = locks_bucket(&txn)?;

        let existing = match txn.get_entry(&bucket, key)? {
            Some(raw) => Some(serde_json::from_slice::<LockRecord>(&raw)?),
            None => None,
        };

        if let Some(current) = existing {
            if current.is_active(now) {
                if current.owner == owner {
                    let refreshed = LockRecord {
                        valid_until: lease_end(now, ttl),
                        ..current
                    };
                    txn.put_entry(&bucket, key, &serde_json::to_vec(&refreshed)?)?;
                    txn.commit()?;
                    debug!(key, owner, "lock refreshed");
                    return Ok((refreshed, true));
                }
                // Held by someone else; the open transaction aborts on drop.
                debug!(key, owner, holder = %current.owner, "lock claim denied");
                return Ok((current, false));
            }
        }

        let fresh = LockRecord {
            key: key.to_string(),
            owner: owner.to_string(),
            created_at: now,
            valid_until: lease_end(now, ttl),
        };
        txn.put_entry(&bucket, key, &serde_json::to_vec(&fresh)?)?;
        txn.commit()?;
        debug!(key, owner, valid_until = %fresh.valid_until, "lock claimed");
        Ok((fresh, true))
    }

    /// Releases the lease named `key` if `owner` holds it.
    ///
    /// An expired record is removed on the way and reported as
    /// `LockNotFound`, same as a missing record. A live lease held by
    /// another owner is `NotOwner`.
    pub fn release(&self, key: &str, owner: &str) -> Result<(), StoreError> {
        let _guard = self.guard.lock();
        let now = Utc::now();

        let mut txn = self.substrate.begin_write()?;
        let bucket = locks_bucket(&txn)?;

        let raw = txn.get_entry(&bucket, key)?.ok_or(StoreError::LockNotFound)?;
        let current: LockRecord = serde_json::from_slice(&raw)?;

        if !current.is_active(now) {
            txn.delete_entry(&bucket, key)?;
            txn.commit()?;
            debug!(key, "expired lock removed on release");
            return Err(StoreError::LockNotFound);
        }
        if current.owner != owner {
            return Err(StoreError::NotOwner);
        }

        txn.delete_entry(&bucket, key)?;
        txn.commit()?;
        debug!(key, owner, "lock released");
        Ok(())
    }
}

fn locks_bucket<W: WriteTxn>(txn: &W) -> Result<BucketId, StoreError> {
    let bucket = BucketId::root().child(LOCKS_BUCKET);
    if !txn.bucket_exists(&bucket)? {
        return Err(StoreError::LocksBucketMissing);
    }
    Ok(bucket)
}

/// End of a lease starting `now`. Absurdly large TTLs clamp to the maximum
/// representable instant instead of overflowing.
fn lease_end(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::redb::RedbStore;

    const TTL: Duration = Duration::from_secs(60);

    fn service() -> (tempfile::TempDir, LockService<RedbStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("test.redb")).unwrap();
        (dir, LockService::new(Arc::new(store), TTL))
    }

    #[test]
    fn test_fresh_claim() {
        let (_dir, locks) = service();
        let (record, acquired) = locks.claim("job", "worker-1", None).unwrap();
        assert!(acquired);
        assert_eq!(record.owner, "worker-1");
        assert!(record.valid_until > record.created_at);
    }

    #[test]
    fn test_refresh_keeps_created_at() {
        let (_dir, locks) = service();
        let (first, _) = locks.claim("job", "worker-1", None).unwrap();
        std::thread::sleep(Duration::from_millis(10));
        let (second, acquired) = locks.claim("job", "worker-1", None).unwrap();
        assert!(acquired);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.valid_until > first.valid_until);
    }

    #[test]
    fn test_claim_denied_returns_holder() {
        let (_dir, locks) = service();
        let (held, _) = locks.claim("job", "worker-1", None).unwrap();
        let (record, acquired) = locks.claim("job", "worker-2", None).unwrap();
        assert!(!acquired);
        assert_eq!(record, held);
    }

    #[test]
    fn test_expired_lock_is_overwritten() {
        let (_dir, locks) = service();
        let (first, _) = locks
            .claim("job", "worker-1", Some(Duration::from_millis(5)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));
        let (second, acquired) = locks.claim("job", "worker-2", None).unwrap();
        assert!(acquired);
        assert_eq!(second.owner, "worker-2");
        assert!(second.created_at > first.created_at);
    }

    #[test]
    fn test_explicit_ttl() {
        let (_dir, locks) = service();
        let (record, _) = locks
            .claim("job", "worker-1", Some(Duration::from_secs(3600)))
            .unwrap();
        let lease = record.valid_until - record.created_at;
        assert_eq!(lease, chrono::Duration::seconds(3600));
    }

    #[test]
    fn test_huge_ttl_clamps() {
        let (_dir, locks) = service();
        let (record, acquired) = locks
            .claim("job", "worker-1", Some(Duration::from_secs(u64::MAX)))
            .unwrap();
        assert!(acquired);
        assert_eq!(record.valid_until, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_release() {
        let (_dir, locks) = service();
        locks.claim("job", "worker-1", None).unwrap();
        locks.release("job", "worker-1").unwrap();
        // Gone, so a competitor can claim immediately.
        let (_, acquired) = locks.claim("job", "worker-2", None).unwrap();
        assert!(acquired);
    }

    #[test]
    fn test_release_unknown_key() {
        let (_dir, locks) = service();
        assert!(matches!(
            locks.release("nope", "worker-1"),
            Err(StoreError::LockNotFound)
        ));
    }

    #[test]
    fn test_release_wrong_owner_keeps_lock() {
        let (_dir, locks) = service();
        locks.claim("job", "worker-1", None).unwrap();
        assert!(matches!(
            locks.release("job", "worker-2"),
            Err(StoreError::NotOwner)
        ));
        let (_, acquired) = locks.claim("job", "worker-2", None).unwrap();
        assert!(!acquired);
    }

    #[test]
    fn test_release_expired_reports_not_found_and_removes() {
        let (_dir, locks) = service();
        locks
            .claim("job", "worker-1", Some(Duration::from_millis(5)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(matches!(
            locks.release("job", "worker-1"),
            Err(StoreError::LockNotFound)
        ));
        // The stale record was removed, not just skipped.
        assert!(matches!(
            locks.release("job", "worker-1"),
            Err(StoreError::LockNotFound)
        ));
    }

    #[test]
    fn test_concurrent_claims_grant_one() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("test.redb")).unwrap();
        let locks = Arc::new(LockService::new(Arc::new(store), TTL));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let locks = Arc::clone(&locks);
                std::thread::spawn(move || {
                    let owner = format!("worker-{i}");
                    let (_, acquired) = locks.claim("job", &owner, None).unwrap();
                    acquired
                })
            })
            .collect();

        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|acquired| *acquired)
            .count();
        assert_eq!(granted, 1);
    }
}
