//! TTL-leased lock registry.

pub mod model;
pub mod service;

pub use model::LockRecord;
pub use service::LockService;
