use ledger_core::store::RecordStore;
use ledger_core::{Record, StoreError};
use serde_json::Value;
use sled::{Db, IVec, Tree};
use std::path::Path;
use tracing::{debug, info};

const TREE_BLOCKS: &str = "blocks";

/// sled-backed record store. Keys are big-endian `u64` indices so sled's
/// lexicographic key order is index order; values are JSON records.
#[derive(Clone)]
pub struct SledStore {
  db: Db,
  blocks: Tree,
}

fn unavailable(err: sled::Error) -> StoreError {
  StoreError::Unavailable(err.to_string())
}

impl SledStore {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
    let db = sled::open(path.as_ref()).map_err(unavailable)?;
    let blocks = db.open_tree(TREE_BLOCKS).map_err(unavailable)?;
    info!(path = %path.as_ref().display(), records = blocks.len(), "sled store opened");
    Ok(Self { db, blocks })
  }

  pub fn get(&self, index: u64) -> Result<Option<Record>, StoreError> {
    let key = index.to_be_bytes();
    match self.blocks.get(key).map_err(unavailable)? {
      Some(bytes) => decode_record(&index.to_string(), &bytes).map(Some),
      None => Ok(None),
    }
  }

  pub fn len(&self) -> usize {
    self.blocks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.blocks.is_empty()
  }

  /// Removes every record. Only meant for tests and tooling.
  pub fn clear(&self) -> Result<(), StoreError> {
    self.blocks.clear().map_err(unavailable)?;
    self.close()
  }

  /// Flushes pending writes to disk.
  pub fn close(&self) -> Result<(), StoreError> {
    self.db.flush().map_err(unavailable)?;
    Ok(())
  }
}

fn decode_key(key: &IVec) -> Result<u64, StoreError> {
  let bytes: &[u8] = key;
  let arr: [u8; 8] = bytes.try_into().map_err(|_| StoreError::Corrupt {
    key: format!("{bytes:02x?}"),
    reason: format!("expected an 8 byte index key, found {} bytes", bytes.len()),
  })?;
  Ok(u64::from_be_bytes(arr))
}

fn decode_record(key: &str, bytes: &[u8]) -> Result<Record, StoreError> {
  let corrupt = |reason: String| StoreError::Corrupt {
    key: key.to_string(),
    reason,
  };
  match serde_json::from_slice::<Value>(bytes) {
    Ok(Value::Object(record)) => Ok(record),
    Ok(_) => Err(corrupt("record is not a JSON object".to_string())),
    Err(err) => Err(corrupt(err.to_string())),
  }
}

impl RecordStore for SledStore {
  fn load_all_ordered(&self) -> Result<Vec<Record>, StoreError> {
    let mut records = Vec::with_capacity(self.blocks.len());
    for entry in self.blocks.iter() {
      let (key, value) = entry.map_err(unavailable)?;
      let index = decode_key(&key)?;
      records.push(decode_record(&index.to_string(), &value)?);
    }
    debug!(records = records.len(), "loaded records from sled");
    Ok(records)
  }

  fn upsert(&self, index: u64, record: &Record) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(record)
      .map_err(|err| StoreError::Unavailable(format!("failed to encode record {index}: {err}")))?;
    self
      .blocks
      .insert(index.to_be_bytes(), bytes)
      .map_err(unavailable)?;
    self.db.flush().map_err(unavailable)?;
    Ok(())
  }
}
