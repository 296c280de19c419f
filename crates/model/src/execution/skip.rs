use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of chunk processing in which an item was skipped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SkipPhase {
    Read,
    Process,
    Write,
}

impl SkipPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipPhase::Read => "READ",
            SkipPhase::Process => "PROCESS",
            SkipPhase::Write => "WRITE",
        }
    }
}

impl fmt::Display for SkipPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tolerated item failure, handed to the skip listener before it is counted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipRecord {
    pub id: String,
    pub run_id: u64,
    pub step: String,
    pub phase: SkipPhase,
    pub cause: String,
    /// Best-effort snapshot of the item (raw line for read failures).
    pub item: Option<serde_json::Value>,
    pub skipped_at: DateTime<Utc>,
}

impl SkipRecord {
    pub fn new(
        run_id: u64,
        step: &str,
        phase: SkipPhase,
        cause: impl Into<String>,
        item: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            run_id,
            step: step.to_string(),
            phase,
            cause: cause.into(),
            item,
            skipped_at: Utc::now(),
        }
    }
}
