use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::{Record, StoreError};

/// Durable, index-keyed storage the ledger mirrors its chain into.
/// Lives in `ledger-core` so backends can depend on the core, not the reverse.
pub trait RecordStore: Send + Sync {
    /// Every persisted record, ordered by `index` ascending.
    fn load_all_ordered(&self) -> Result<Vec<Record>, StoreError>;

    /// Idempotent write keyed by `index`.
    fn upsert(&self, index: u64, record: &Record) -> Result<(), StoreError>;
}

/// Volatile `RecordStore` for tests and hosts that do not need durability.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<u64, Record>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with `StoreError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn get(&self, index: u64) -> Option<Record> {
        self.records.lock().get(&index).cloned()
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    fn load_all_ordered(&self) -> Result<Vec<Record>, StoreError> {
        self.check_online()?;
        Ok(self.records.lock().values().cloned().collect())
    }

    fn upsert(&self, index: u64, record: &Record) -> Result<(), StoreError> {
        self.check_online()?;
        self.records.lock().insert(index, record.clone());
        Ok(())
    }
}
