use thiserror::Error;

/// Errors raised by report-store implementations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Store lock poisoned: {0}")]
    Poisoned(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Errors raised while interpreting a log record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    /// The record body could not be turned into a field map.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("unknown source type: {0}")]
    UnknownSourceType(String),
}
