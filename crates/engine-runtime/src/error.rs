use connectors::{http::error::FetchError, sql::base::error::StoreError};
use engine_config::error::SettingsError;
use engine_core::error::StateStoreError;
use model::execution::params::ParameterError;
use thiserror::Error;

/// Errors that prevent a job from running to a terminal status.
///
/// Step failures are not errors; they are reported in the `JobResult`.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Configuration error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Configuration error: {0}")]
    Parameters(#[from] ParameterError),

    #[error("State store error: {0}")]
    State(#[from] StateStoreError),

    #[error("Database error: {0}")]
    Store(#[from] StoreError),

    #[error("Remote source error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Run {0} does not exist")]
    UnknownRun(u64),

    #[error("Input file changed since run {run_id} started (expected {expected}, found {found})")]
    SourceChanged {
        run_id: u64,
        expected: String,
        found: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
