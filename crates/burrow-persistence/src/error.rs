//! Error types for the persistence layer.

/// Errors raised by the bucket store and the lock registry.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("at least one bucket required")]
    NoBucket,

    #[error("bucket '{0}' not found")]
    BucketNotFound(String),

    #[error("incompatible value: {0}")]
    IncompatibleValue(String),

    #[error("lock not found")]
    LockNotFound,

    #[error("lock held by another owner")]
    NotOwner,

    #[error("lock registry bucket missing")]
    LocksBucketMissing,

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] redb::Error),
}

impl From<redb::DatabaseError> for StoreError {
    fn from(value: redb::DatabaseError) -> Self {
        StoreError::Storage(value.into())
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(value: redb::TransactionError) -> Self {
        StoreError::Storage(value.into())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(value: redb::TableError) -> Self {
        StoreError::Storage(value.into())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(value: redb::StorageError) -> Self {
        StoreError::Storage(value.into())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(value: redb::CommitError) -> Self {
        StoreError::Storage(value.into())
    }
}
