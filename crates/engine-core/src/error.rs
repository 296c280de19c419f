use connectors::{
    file::csv::error::FileError, http::error::FetchError, sql::base::error::StoreError,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("Failed to save checkpoint: {0}")]
    SaveCheckpoint(String),

    #[error("Failed to load checkpoint: {0}")]
    LoadCheckpoint(String),

    #[error("Failed to append execution event: {0}")]
    AppendEvent(String),

    #[error("Failed to iterate execution events: {0}")]
    IterateEvents(String),

    #[error("Failed to allocate run id: {0}")]
    RunSequence(String),

    #[error("Sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

/// Failure to obtain the next item from a source.
#[derive(Error, Debug)]
pub enum ReadError {
    /// The current item could not be parsed; reading can continue.
    #[error("Malformed item: {reason}")]
    Malformed { raw: Option<String>, reason: String },

    #[error("File error: {0}")]
    File(FileError),

    #[error("Remote source error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Source '{0}' was read before being opened")]
    NotOpen(String),
}

impl ReadError {
    pub fn is_skippable(&self) -> bool {
        matches!(self, ReadError::Malformed { .. })
    }

    /// Best-effort copy of the offending input.
    pub fn snapshot(&self) -> Option<serde_json::Value> {
        match self {
            ReadError::Malformed { raw, .. } => raw.clone().map(serde_json::Value::String),
            _ => None,
        }
    }
}

impl From<FileError> for ReadError {
    fn from(err: FileError) -> Self {
        match err {
            FileError::Malformed { line, raw, reason } => ReadError::Malformed {
                raw: Some(raw),
                reason: format!("line {line}: {reason}"),
            },
            other if other.is_record_level() => ReadError::Malformed {
                raw: None,
                reason: other.to_string(),
            },
            other => ReadError::File(other),
        }
    }
}

/// Failure to transform one item. Always skip-accounted.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Invalid value for '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Lookup failed: {0}")]
    Lookup(#[from] StoreError),
}

/// Failure to commit a chunk. The chunk's changes were not applied.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Writer '{0}' was used before being opened")]
    NotOpen(String),
}
