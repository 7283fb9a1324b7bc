//! Durable `RecordStore` backends for the audit ledger.
pub mod sled_store;

pub use sled_store::SledStore;
