use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepStatus {
    Completed,
    Failed,
    /// Admission of new chunks was cancelled; committed work is checkpointed.
    Stopped,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Completed => "COMPLETED",
            StepStatus::Failed => "FAILED",
            StepStatus::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}

/// Counters and terminal status of one step execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepResult {
    pub step: String,
    pub items_read: u64,
    /// Items the transform rejected; not errors.
    pub items_filtered: u64,
    pub items_written: u64,
    pub items_skipped: u64,
    pub chunks_committed: u64,
    pub status: StepStatus,
    pub failure: Option<String>,
}

impl StepResult {
    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Completed,
    Failed,
    Stopped,
}

impl From<StepStatus> for JobStatus {
    fn from(status: StepStatus) -> Self {
        match status {
            StepStatus::Completed => JobStatus::Completed,
            StepStatus::Failed => JobStatus::Failed,
            StepStatus::Stopped => JobStatus::Stopped,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub run_id: u64,
    pub status: JobStatus,
    pub steps: Vec<StepResult>,
}

impl JobResult {
    pub fn step(&self, name: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step == name)
    }
}
