use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParameterError {
    #[error("Missing job parameter: {0}")]
    Missing(&'static str),
}

/// Parameters of one job invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobParameters {
    pub source_file_path: PathBuf,
    pub output_file_path: PathBuf,
    pub run_timestamp: DateTime<Utc>,
    /// Reuse this run id instead of allocating a new one.
    pub restart_run_id: Option<u64>,
}

impl JobParameters {
    pub fn new(source_file_path: impl Into<PathBuf>, output_file_path: impl Into<PathBuf>) -> Self {
        Self {
            source_file_path: source_file_path.into(),
            output_file_path: output_file_path.into(),
            run_timestamp: Utc::now(),
            restart_run_id: None,
        }
    }

    pub fn restart(mut self, run_id: u64) -> Self {
        self.restart_run_id = Some(run_id);
        self
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.source_file_path.as_os_str().is_empty() {
            return Err(ParameterError::Missing("sourceFilePath"));
        }
        if self.output_file_path.as_os_str().is_empty() {
            return Err(ParameterError::Missing("outputFilePath"));
        }
        Ok(())
    }
}
