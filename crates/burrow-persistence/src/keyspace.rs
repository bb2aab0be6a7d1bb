//! Hierarchical key-value operations over the substrate.
//!
//! Every operation addresses a key through a non-empty bucket path. Writes
//! traverse in create mode (missing buckets come into existence), reads and
//! deletes traverse strictly (a missing bucket is an error). A name can hold
//! either a value or a child bucket, never both.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::error::StoreError;
use crate::store::{BucketId, ReadTxn, Substrate, WriteTxn};

/// Bucket-tree key-value store.
pub struct Keyspace<S: Substrate> {
    substrate: Arc<S>,
}

impl<S: Substrate> Clone for Keyspace<S> {
    fn clone(&self) -> Self {
        Keyspace {
            substrate: Arc::clone(&self.substrate),
        }
    }
}

impl<S: Substrate> Keyspace<S> {
    pub fn new(substrate: Arc<S>) -> Self {
        Keyspace { substrate }
    }

    /// Writes `value` under `key` at the end of `buckets`, creating missing
    /// buckets along the way.
    pub fn put(&self, buckets: &[String], key: &str, value: &[u8]) -> Result<(), StoreError> {
        let start = Instant::now();
        let mut txn = self.substrate.begin_write()?;
        let bucket = traverse_create(&mut txn, buckets)?;
        txn.put_entry(&bucket, key, value)?;
        txn.commit()?;
        debug!(elapsed = ?start.elapsed(), key, "put");
        Ok(())
    }

    /// Reads the value under `key`. All buckets in the path must exist. An
    /// absent key in an existing bucket yields `None`; a key that names a
    /// child bucket is an `IncompatibleValue` error.
    pub fn get(&self, buckets: &[String], key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let start = Instant::now();
        let txn = self.substrate.begin_read()?;
        let bucket = traverse_strict(buckets, |id| txn.bucket_exists(id))?;
        if txn.bucket_exists(&bucket.child(key))? {
            return Err(StoreError::IncompatibleValue(format!(
                "'{key}' names a bucket"
            )));
        }
        let value = txn.get_entry(&bucket, key)?;
        debug!(elapsed = ?start.elapsed(), key, "get");
        Ok(value)
    }

    /// Removes the value under `key`. All buckets in the path must exist.
    /// Removing an absent key is a no-op success.
    pub fn delete(&self, buckets: &[String], key: &str) -> Result<(), StoreError> {
        let start = Instant::now();
        let mut txn = self.substrate.begin_write()?;
        let bucket = traverse_strict(buckets, |id| txn.bucket_exists(id))?;
        txn.delete_entry(&bucket, key)?;
        txn.commit()?;
        debug!(elapsed = ?start.elapsed(), key, "delete");
        Ok(())
    }
}

/// Walks `buckets` from the root, requiring every segment to exist.
fn traverse_strict(
    buckets: &[String],
    exists: impl Fn(&BucketId) -> Result<bool, StoreError>,
) -> Result<BucketId, StoreError> {
    if buckets.is_empty() {
        return Err(StoreError::NoBucket);
    }
    let mut current = BucketId::root();
    for segment in buckets {
        let next = current.child(segment);
        if !exists(&next)? {
            return Err(StoreError::BucketNotFound(segment.clone()));
        }
        current = next;
    }
    Ok(current)
}

/// Walks `buckets` from the root, creating every missing segment.
fn traverse_create<W: WriteTxn>(txn: &mut W, buckets: &[String]) -> Result<BucketId, StoreError> {
    if buckets.is_empty() {
        return Err(StoreError::NoBucket);
    }
    let mut current = BucketId::root();
    for segment in buckets {
        let next = current.child(segment);
        if !txn.bucket_exists(&next)? {
            txn.create_bucket(&next, segment)?;
        }
        current = next;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::redb::RedbStore;

    fn keyspace() -> (tempfile::TempDir, Keyspace<RedbStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("test.redb")).unwrap();
        (dir, Keyspace::new(Arc::new(store)))
    }

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_put_creates_nested_buckets() {
        let (_dir, ks) = keyspace();
        ks.put(&path(&["a", "b", "c"]), "k", b"v").unwrap();
        assert_eq!(ks.get(&path(&["a", "b", "c"]), "k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_put_overwrites() {
        let (_dir, ks) = keyspace();
        let buckets = path(&["app"]);
        ks.put(&buckets, "k", b"one").unwrap();
        ks.put(&buckets, "k", b"two").unwrap();
        assert_eq!(ks.get(&buckets, "k").unwrap(), Some(b"two".to_vec()));
    }

    #[test]
    fn test_empty_path_rejected() {
        let (_dir, ks) = keyspace();
        assert!(matches!(ks.put(&[], "k", b"v"), Err(StoreError::NoBucket)));
        assert!(matches!(ks.get(&[], "k"), Err(StoreError::NoBucket)));
        assert!(matches!(ks.delete(&[], "k"), Err(StoreError::NoBucket)));
    }

    #[test]
    fn test_get_missing_bucket() {
        let (_dir, ks) = keyspace();
        ks.put(&path(&["app"]), "k", b"v").unwrap();
        let err = ks.get(&path(&["app", "nope"]), "k").unwrap_err();
        match err {
            StoreError::BucketNotFound(segment) => assert_eq!(segment, "nope"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_get_absent_key_is_none() {
        let (_dir, ks) = keyspace();
        ks.put(&path(&["app"]), "k", b"v").unwrap();
        assert_eq!(ks.get(&path(&["app"]), "missing").unwrap(), None);
    }

    #[test]
    fn test_get_key_naming_bucket() {
        let (_dir, ks) = keyspace();
        ks.put(&path(&["app", "sub"]), "k", b"v").unwrap();
        assert!(matches!(
            ks.get(&path(&["app"]), "sub"),
            Err(StoreError::IncompatibleValue(_))
        ));
    }

    #[test]
    fn test_put_over_bucket_rejected() {
        let (_dir, ks) = keyspace();
        ks.put(&path(&["app", "sub"]), "k", b"v").unwrap();
        assert!(matches!(
            ks.put(&path(&["app"]), "sub", b"v"),
            Err(StoreError::IncompatibleValue(_))
        ));
    }

    #[test]
    fn test_put_through_value_rejected() {
        let (_dir, ks) = keyspace();
        ks.put(&path(&["app"]), "leaf", b"v").unwrap();
        assert!(matches!(
            ks.put(&path(&["app", "leaf"]), "k", b"v"),
            Err(StoreError::IncompatibleValue(_))
        ));
    }

    #[test]
    fn test_delete_removes_value() {
        let (_dir, ks) = keyspace();
        let buckets = path(&["app"]);
        ks.put(&buckets, "k", b"v").unwrap();
        ks.delete(&buckets, "k").unwrap();
        assert_eq!(ks.get(&buckets, "k").unwrap(), None);
    }

    #[test]
    fn test_delete_absent_key_is_noop() {
        let (_dir, ks) = keyspace();
        ks.put(&path(&["app"]), "k", b"v").unwrap();
        ks.delete(&path(&["app"]), "other").unwrap();
    }

    #[test]
    fn test_delete_missing_bucket() {
        let (_dir, ks) = keyspace();
        assert!(matches!(
            ks.delete(&path(&["nope"]), "k"),
            Err(StoreError::BucketNotFound(_))
        ));
    }

    #[test]
    fn test_sibling_names_do_not_collide() {
        let (_dir, ks) = keyspace();
        ks.put(&path(&["ab"]), "c", b"one").unwrap();
        ks.put(&path(&["a"]), "bc", b"two").unwrap();
        assert_eq!(ks.get(&path(&["ab"]), "c").unwrap(), Some(b"one".to_vec()));
        assert_eq!(ks.get(&path(&["a"]), "bc").unwrap(), Some(b"two".to_vec()));
    }
}
