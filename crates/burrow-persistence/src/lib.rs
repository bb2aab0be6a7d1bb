//! Burrow persistence layer
//!
//! This crate provides:
//! - `store`: the transactional substrate over an embedded redb database
//! - `keyspace`: hierarchical bucket key-value operations
//! - `lock`: the TTL-leased lock registry
//! - `error`: shared error types for the layer

pub mod error;
pub mod keyspace;
pub mod lock;
pub mod store;

pub use error::StoreError;
pub use keyspace::Keyspace;
pub use lock::{LockRecord, LockService};
pub use store::redb::RedbStore;
