//! Transactional substrate for the bucket store.
//!
//! Buckets form a tree addressed by [`BucketId`], an encoded path of
//! length-prefixed segments. Entry keys use the same encoding appended to
//! their bucket's id, so an entry key and a child bucket id occupy the same
//! byte space and collisions between the two can be detected with a single
//! lookup in the other table.

pub mod redb;

use crate::error::StoreError;

/// Top-level bucket holding serialized lock records. Created during
/// bootstrap; no other component writes to it.
pub const LOCKS_BUCKET: &str = "_locks";

/// Encoded path of a bucket in the tree. The root is the empty encoding;
/// each segment is appended as a u32 big-endian length followed by the
/// segment bytes, so no separator byte can collide with segment content.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BucketId(Vec<u8>);

impl BucketId {
    pub fn root() -> Self {
        BucketId(Vec::new())
    }

    /// Builds the id of a path in one go.
    pub fn from_path<S: AsRef<str>>(segments: &[S]) -> Self {
        let mut id = BucketId::root();
        for segment in segments {
            id = id.child(segment.as_ref());
        }
        id
    }

    pub fn child(&self, segment: &str) -> BucketId {
        let mut encoded = Vec::with_capacity(self.0.len() + 4 + segment.len());
        encoded.extend_from_slice(&self.0);
        encoded.extend_from_slice(&(segment.len() as u32).to_be_bytes());
        encoded.extend_from_slice(segment.as_bytes());
        BucketId(encoded)
    }

    /// Encoded key of an entry stored directly under this bucket. Identical
    /// to the encoding of a child bucket named `key`.
    pub fn entry_key(&self, key: &str) -> Vec<u8> {
        self.child(key).0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

/// Storage engine seam. One writer at a time; readers see a consistent
/// snapshot taken at `begin_read`.
pub trait Substrate: Send + Sync + 'static {
    type Read: ReadTxn;
    type Write: WriteTxn;

    fn begin_read(&self) -> Result<Self::Read, StoreError>;
    fn begin_write(&self) -> Result<Self::Write, StoreError>;
}

/// Read-only snapshot of the store.
pub trait ReadTxn {
    fn bucket_exists(&self, bucket: &BucketId) -> Result<bool, StoreError>;
    fn get_entry(&self, bucket: &BucketId, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
}

/// Read-write transaction. Dropping without `commit` aborts every pending
/// mutation.
pub trait WriteTxn {
    fn bucket_exists(&self, bucket: &BucketId) -> Result<bool, StoreError>;

    /// Creates a bucket. Fails with `IncompatibleValue` when an entry
    /// already occupies the bucket's encoded id in the parent.
    fn create_bucket(&mut self, bucket: &BucketId, segment: &str) -> Result<(), StoreError>;

    fn get_entry(&self, bucket: &BucketId, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Writes an entry. Fails with `IncompatibleValue` when a child bucket
    /// already occupies the key.
    fn put_entry(&mut self, bucket: &BucketId, key: &str, value: &[u8])
    -> Result<(), StoreError>;

    /// Removes an entry. Removing an absent entry is a no-op; removing a key
    /// occupied by a child bucket fails with `IncompatibleValue`.
    fn delete_entry(&mut self, bucket: &BucketId, key: &str) -> Result<(), StoreError>;

    fn commit(self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_id_encoding_is_prefix_free() {
        let a = BucketId::root().child("ab").child("c");
        let b = BucketId::root().child("a").child("bc");
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_entry_key_matches_child_encoding() {
        let bucket = BucketId::root().child("app");
        assert_eq!(bucket.entry_key("cfg"), bucket.child("cfg").as_bytes().to_vec());
    }

    #[test]
    fn test_from_path() {
        let id = BucketId::from_path(&["a", "b"]);
        assert_eq!(id, BucketId::root().child("a").child("b"));
        assert!(BucketId::from_path::<&str>(&[]).is_root());
    }
}
