use thiserror::Error;

/// Failures reported by a `RecordStore` backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("stored record under key {key} is corrupt: {reason}")]
    Corrupt { key: String, reason: String },
}

#[derive(Debug, Error)]
pub enum LedgerError {
    /// The durable store could not be read or written.
    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),

    /// A persisted record could not be turned back into a block.
    #[error("malformed stored block (index {index:?}): {reason}")]
    MalformedStoredBlock { index: Option<u64>, reason: String },

    /// A caller-supplied timestamp is not `YYYY-MM-DDTHH:MM:SSZ`.
    #[error("invalid block timestamp {0:?}, expected YYYY-MM-DDTHH:MM:SSZ")]
    InvalidTimestamp(String),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => LedgerError::StoreUnavailable(msg),
            StoreError::Corrupt { key, reason } => LedgerError::MalformedStoredBlock {
                index: key.parse().ok(),
                reason,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_store_error_keeps_numeric_key_as_index() {
        let err: LedgerError = StoreError::Corrupt {
            key: "7".to_string(),
            reason: "not json".to_string(),
        }
        .into();
        match err {
            LedgerError::MalformedStoredBlock { index, reason } => {
                assert_eq!(index, Some(7));
                assert_eq!(reason, "not json");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn corrupt_store_error_with_opaque_key_has_no_index() {
        let err: LedgerError = StoreError::Corrupt {
            key: "0x0102".to_string(),
            reason: "bad key width".to_string(),
        }
        .into();
        assert!(matches!(
            err,
            LedgerError::MalformedStoredBlock { index: None, .. }
        ));
    }

    #[test]
    fn unavailable_maps_to_store_unavailable() {
        let err: LedgerError = StoreError::Unavailable("connection refused".into()).into();
        assert_eq!(
            err.to_string(),
            "record store unavailable: connection refused"
        );
    }
}
