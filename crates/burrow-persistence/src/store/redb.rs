//! redb-backed substrate.
//!
//! Two tables back the bucket tree: `buckets` marks which encoded paths
//! exist, `entries` maps encoded path + key to bytes. Cross-table lookups
//! implement the bucket/entry collision rules.

use std::path::Path;

use redb::{Database, ReadTransaction, ReadableTable, TableDefinition, WriteTransaction};
use tracing::info;

use crate::error::StoreError;
use crate::store::{BucketId, LOCKS_BUCKET, ReadTxn, Substrate, WriteTxn};

const BUCKETS: TableDefinition<&[u8], ()> = TableDefinition::new("buckets");
const ENTRIES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("entries");

/// Embedded store over a single redb file.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Opens (or creates) the database file and runs bootstrap: both tables
    /// and the root lock bucket exist afterwards.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let db = Database::create(path)?;
        let store = RedbStore { db };
        store.bootstrap()?;
        info!(path = %path.display(), "database opened");
        Ok(store)
    }

    fn bootstrap(&self) -> Result<(), StoreError> {
        let mut txn = self.begin_write()?;
        let locks = BucketId::root().child(LOCKS_BUCKET);
        if !txn.bucket_exists(&locks)? {
            txn.create_bucket(&locks, LOCKS_BUCKET)?;
        }
        txn.commit()
    }
}

impl Substrate for RedbStore {
    type Read = RedbReadTxn;
    type Write = RedbWriteTxn;

    fn begin_read(&self) -> Result<Self::Read, StoreError> {
        Ok(RedbReadTxn {
            txn: self.db.begin_read()?,
        })
    }

    fn begin_write(&self) -> Result<Self::Write, StoreError> {
        let txn = self.db.begin_write()?;
        // Opening the tables creates them on first use.
        txn.open_table(BUCKETS)?;
        txn.open_table(ENTRIES)?;
        Ok(RedbWriteTxn { txn })
    }
}

pub struct RedbReadTxn {
    txn: ReadTransaction,
}

impl ReadTxn for RedbReadTxn {
    fn bucket_exists(&self, bucket: &BucketId) -> Result<bool, StoreError> {
        if bucket.is_root() {
            return Ok(true);
        }
        let table = self.txn.open_table(BUCKETS)?;
        Ok(table.get(bucket.as_bytes())?.is_some())
    }

    fn get_entry(&self, bucket: &BucketId, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let table = self.txn.open_table(ENTRIES)?;
        let encoded = bucket.entry_key(key);
        Ok(table.get(encoded.as_slice())?.map(|guard| guard.value().to_vec()))
    }
}

pub struct RedbWriteTxn {
    txn: WriteTransaction,
}

impl WriteTxn for RedbWriteTxn {
    fn bucket_exists(&self, bucket: &BucketId) -> Result<bool, StoreError> {
        if bucket.is_root() {
            return Ok(true);
        }
        let table = self.txn.open_table(BUCKETS)?;
        Ok(table.get(bucket.as_bytes())?.is_some())
    }

    fn create_bucket(&mut self, bucket: &BucketId, segment: &str) -> Result<(), StoreError> {
        {
            let entries = self.txn.open_table(ENTRIES)?;
            if entries.get(bucket.as_bytes())?.is_some() {
                return Err(StoreError::IncompatibleValue(format!(
                    "'{segment}' already holds a value"
                )));
            }
        }
        let mut buckets = self.txn.open_table(BUCKETS)?;
        buckets.insert(bucket.as_bytes(), ())?;
        Ok(())
    }

    fn get_entry(&self, bucket: &BucketId, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let table = self.txn.open_table(ENTRIES)?;
        let encoded = bucket.entry_key(key);
        Ok(table.get(encoded.as_slice())?.map(|guard| guard.value().to_vec()))
    }

    fn put_entry(
        &mut self,
        bucket: &BucketId,
        key: &str,
        value: &[u8],
    ) -> Result<(), StoreError> {
        let encoded = bucket.entry_key(key);
        {
            let buckets = self.txn.open_table(BUCKETS)?;
            if buckets.get(encoded.as_slice())?.is_some() {
                return Err(StoreError::IncompatibleValue(format!(
                    "'{key}' already names a bucket"
                )));
            }
        }
        let mut entries = self.txn.open_table(ENTRIES)?;
        entries.insert(encoded.as_slice(), value)?;
        Ok(())
    }

    fn delete_entry(&mut self, bucket: &BucketId, key: &str) -> Result<(), StoreError> {
        let encoded = bucket.entry_key(key);
        {
            let buckets = self.txn.open_table(BUCKETS)?;
            if buckets.get(encoded.as_slice())?.is_some() {
                return Err(StoreError::IncompatibleValue(format!(
                    "'{key}' already names a bucket"
                )));
            }
        }
        let mut entries = self.txn.open_table(ENTRIES)?;
        entries.remove(encoded.as_slice())?;
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        self.txn.commit()?;
        Ok(())
    }
}
