use std::sync::Arc;

use chrono::NaiveDateTime;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::constants::{GENESIS_PREVIOUS_HASH, TIMESTAMP_FORMAT};
use crate::store::RecordStore;
use crate::{now_utc, Block, Data, LedgerError};

/// Where and why a chain stopped verifying.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainFault {
    #[error("block {index} does not hash to its stored hash")]
    HashMismatch { index: u64 },

    #[error("block {index} does not link to the hash of its predecessor")]
    BrokenLink { index: u64 },
}

/// Checks every block after the first: its recomputed hash must equal the
/// stored one, and its `previous_hash` must equal its predecessor's hash.
/// The first block is the root of trust and is not recomputed.
pub fn verify_chain(blocks: &[Block]) -> Result<(), ChainFault> {
    for pair in blocks.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);
        if current.compute_hash() != current.hash() {
            return Err(ChainFault::HashMismatch {
                index: current.index(),
            });
        }
        if current.previous_hash() != previous.hash() {
            return Err(ChainFault::BrokenLink {
                index: current.index(),
            });
        }
    }
    Ok(())
}

pub fn validate_chain(blocks: &[Block]) -> bool {
    verify_chain(blocks).is_ok()
}

/// Append-only hash chain mirrored into a `RecordStore`.
///
/// Appends are serialized by `writer`; a block becomes visible to readers only
/// after the store has accepted it.
pub struct Ledger<S: RecordStore> {
    store: Arc<S>,
    blocks: RwLock<Vec<Block>>,
    writer: Mutex<()>,
}

impl<S: RecordStore> Ledger<S> {
    /// Replays the store into memory, or creates and persists the genesis
    /// block when the store is empty. Stored hashes are trusted here.
    pub fn load_or_bootstrap(store: Arc<S>) -> Result<Self, LedgerError> {
        let records = store.load_all_ordered()?;

        let blocks = if records.is_empty() {
            let genesis = Block::genesis(now_utc());
            store.upsert(genesis.index(), &genesis.to_record())?;
            info!(hash = %genesis.hash(), "created genesis block");
            vec![genesis]
        } else {
            let mut blocks = Vec::with_capacity(records.len());
            for (position, record) in records.iter().enumerate() {
                let block = Block::from_record(record)?;
                if block.index() != position as u64 {
                    return Err(LedgerError::MalformedStoredBlock {
                        index: Some(block.index()),
                        reason: format!("expected index {position}, chain is not contiguous"),
                    });
                }
                blocks.push(block);
            }
            info!(height = blocks.len(), "loaded ledger from store");
            blocks
        };

        Ok(Self {
            store,
            blocks: RwLock::new(blocks),
            writer: Mutex::new(()),
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Appends `data` as a new block stamped with the current UTC time.
    pub fn append(&self, data: Data) -> Result<Block, LedgerError> {
        self.append_at(data, now_utc())
    }

    /// Appends `data` with a caller-supplied timestamp in `TIMESTAMP_FORMAT`.
    /// The block is persisted first; memory is only extended once the store
    /// has accepted it.
    pub fn append_at(&self, data: Data, timestamp: String) -> Result<Block, LedgerError> {
        let well_formed = NaiveDateTime::parse_from_str(&timestamp, TIMESTAMP_FORMAT)
            .is_ok_and(|parsed| parsed.format(TIMESTAMP_FORMAT).to_string() == timestamp);
        if !well_formed {
            return Err(LedgerError::InvalidTimestamp(timestamp));
        }
        let _writer = self.writer.lock();

        let (index, previous_hash) = match self.blocks.read().last() {
            Some(tail) => (tail.index() + 1, tail.hash().to_owned()),
            None => (0, GENESIS_PREVIOUS_HASH.to_owned()),
        };
        let block = Block::new(index, timestamp, data, previous_hash);

        if let Err(err) = self.store.upsert(index, &block.to_record()) {
            error!(index, %err, "failed to persist block, append rejected");
            return Err(err.into());
        }

        self.blocks.write().push(block.clone());
        info!(index, hash = %block.hash(), "appended block");
        Ok(block)
    }

    /// Same walk as `is_valid`, reporting the first fault found.
    pub fn verify(&self) -> Result<(), ChainFault> {
        let result = verify_chain(&self.blocks.read());
        if let Err(fault) = &result {
            warn!(%fault, "ledger failed verification");
        }
        result
    }

    pub fn is_valid(&self) -> bool {
        self.verify().is_ok()
    }

    /// Point-in-time copy of the whole chain.
    pub fn snapshot(&self) -> Vec<Block> {
        self.blocks.read().clone()
    }

    pub fn get(&self, index: u64) -> Option<Block> {
        let blocks = self.blocks.read();
        usize::try_from(index)
            .ok()
            .and_then(|i| blocks.get(i))
            .cloned()
    }

    pub fn latest(&self) -> Option<Block> {
        self.blocks.read().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }
}
