use connectors::{http::error::FetchError, sql::base::error::StoreError};
use engine_config::error::SettingsError;
use engine_runtime::error::JobError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),

    #[error("Job could not run: {0}")]
    Job(#[from] JobError),

    #[error("Database check failed: {0}")]
    Store(#[from] StoreError),

    #[error("Remote feed check failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
