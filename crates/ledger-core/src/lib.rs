pub mod chain;
pub mod constants;
pub mod error;
pub mod store;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::constants::{GENESIS_INDEX, GENESIS_MESSAGE, GENESIS_PREVIOUS_HASH, TIMESTAMP_FORMAT};
pub use crate::error::{LedgerError, StoreError};

/// Opaque block payload: string keys to JSON values.
pub type Data = Map<String, Value>;

/// Persisted shape of a block: one JSON document with the five block fields.
pub type Record = Map<String, Value>;

/// One immutable, hash-linked entry of the ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    index: u64,
    timestamp: String,
    data: Data,
    previous_hash: String,
    hash: String,
}

impl Block {
    /// Builds a block and computes its hash from the supplied fields.
    pub fn new(
        index: u64,
        timestamp: impl Into<String>,
        data: Data,
        previous_hash: impl Into<String>,
    ) -> Self {
        let timestamp = timestamp.into();
        let previous_hash = previous_hash.into();
        let hash = canonical_hash(index, &timestamp, &data, &previous_hash);
        Self {
            index,
            timestamp,
            data,
            previous_hash,
            hash,
        }
    }

    /// Rebuilds a block with a hash taken as-is from storage. The hash is not
    /// recomputed here; `chain::verify_chain` checks it on demand.
    pub fn from_parts(
        index: u64,
        timestamp: String,
        data: Data,
        previous_hash: String,
        hash: String,
    ) -> Self {
        Self {
            index,
            timestamp,
            data,
            previous_hash,
            hash,
        }
    }

    pub fn genesis(timestamp: impl Into<String>) -> Self {
        let mut data = Data::new();
        data.insert("message".to_string(), Value::from(GENESIS_MESSAGE));
        Self::new(GENESIS_INDEX, timestamp, data, GENESIS_PREVIOUS_HASH)
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn is_genesis(&self) -> bool {
        self.index == GENESIS_INDEX
    }

    /// Recomputes the hash from the block's own fields.
    pub fn compute_hash(&self) -> String {
        canonical_hash(self.index, &self.timestamp, &self.data, &self.previous_hash)
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("index".to_string(), Value::from(self.index));
        record.insert("timestamp".to_string(), Value::from(self.timestamp.clone()));
        record.insert("data".to_string(), Value::Object(self.data.clone()));
        record.insert(
            "previous_hash".to_string(),
            Value::from(self.previous_hash.clone()),
        );
        record.insert("hash".to_string(), Value::from(self.hash.clone()));
        record
    }

    /// Reconstructs a block from a stored record, trusting its `hash`.
    pub fn from_record(record: &Record) -> Result<Self, LedgerError> {
        let malformed = |reason: String| LedgerError::MalformedStoredBlock {
            index: record.get("index").and_then(Value::as_u64),
            reason,
        };

        let index = required(record, "index")
            .and_then(|v| {
                v.as_u64()
                    .ok_or_else(|| "field `index` is not a non-negative integer".to_string())
            })
            .map_err(malformed)?;
        let timestamp = required_str(record, "timestamp").map_err(malformed)?;
        let data = required(record, "data")
            .and_then(|v| {
                v.as_object()
                    .cloned()
                    .ok_or_else(|| "field `data` is not an object".to_string())
            })
            .map_err(malformed)?;
        let previous_hash = required_str(record, "previous_hash").map_err(malformed)?;
        let hash = required_str(record, "hash").map_err(malformed)?;

        Ok(Self::from_parts(index, timestamp, data, previous_hash, hash))
    }
}

fn required<'a>(record: &'a Record, field: &str) -> Result<&'a Value, String> {
    record
        .get(field)
        .ok_or_else(|| format!("missing field `{field}`"))
}

fn required_str(record: &Record, field: &str) -> Result<String, String> {
    required(record, field)?
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| format!("field `{field}` is not a string"))
}

/// Current UTC time in the ledger's timestamp format.
pub fn now_utc() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Serializes `value` as compact JSON with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// SHA-256 (lowercase hex) over the canonical form of the four hashed fields.
pub fn canonical_hash(index: u64, timestamp: &str, data: &Data, previous_hash: &str) -> String {
    let content = json!({
        "index": index,
        "timestamp": timestamp,
        "data": data,
        "previous_hash": previous_hash,
    });
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(&content).as_bytes());
    hex::encode(hasher.finalize())
}
