//! Error types for history operations.

/// Errors returned by the history store, codec and helpers.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// Role string did not name a known record kind.
    #[error("invalid record kind: {0}")]
    InvalidRecordKind(String),
    /// Metadata value cannot be persisted faithfully.
    #[error("invalid metadata for {key}: {reason}")]
    InvalidMetadata { key: String, reason: String },
    /// Persisted history could not be turned back into well-formed records.
    #[error("corrupt persisted data in {source_name}: {reason}")]
    CorruptPersistedData { source_name: String, reason: String },
    /// Capacity was zero or could not be determined.
    #[error("capacity misconfigured: {0}")]
    CapacityMisconfigured(String),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error while encoding history.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HistoryError {
    /// Build a corrupt-data error for the named source.
    pub(crate) fn corrupt(source_name: &str, reason: impl Into<String>) -> Self {
        Self::CorruptPersistedData {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }
}
