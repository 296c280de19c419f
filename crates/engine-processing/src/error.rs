use engine_core::error::{ReadError, StateStoreError, WriteError};
use thiserror::Error;

/// Reason a chunk step did not complete.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("Skip limit exceeded: {skipped} skips, limit {limit}")]
    SkipLimitExceeded { skipped: u64, limit: u64 },

    #[error("Read failed: {0}")]
    Read(#[from] ReadError),

    #[error("Chunk {seq} could not be committed: {source}")]
    ChunkCommit {
        seq: u64,
        #[source]
        source: WriteError,
    },

    #[error("Writer could not be opened: {0}")]
    WriterOpen(WriteError),

    #[error("State store error: {0}")]
    State(#[from] StateStoreError),

    #[error("Chunk worker aborted: {0}")]
    Worker(String),
}
