use chrono::{DateTime, Utc};
use model::{
    execution::result::{JobStatus, StepResult},
    pagination::cursor::Cursor,
};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum ExecutionEvent {
    JobStart {
        run_id: u64,
        restart: bool,
        /// blake3 digest of the input file, used to detect a changed input on restart.
        source_fingerprint: Option<String>,
        at: DateTime<Utc>,
    },
    StepStart {
        run_id: u64,
        step: String,
        resume_from: Option<Cursor>,
    },
    ChunkCommitted {
        run_id: u64,
        step: String,
        seq: u64,
        items: u64,
    },
    StepDone {
        run_id: u64,
        result: StepResult,
    },
    JobDone {
        run_id: u64,
        status: JobStatus,
        at: DateTime<Utc>,
    },
}

impl ExecutionEvent {
    pub fn run_id(&self) -> u64 {
        match self {
            ExecutionEvent::JobStart { run_id, .. } => *run_id,
            ExecutionEvent::StepStart { run_id, .. } => *run_id,
            ExecutionEvent::ChunkCommitted { run_id, .. } => *run_id,
            ExecutionEvent::StepDone { run_id, .. } => *run_id,
            ExecutionEvent::JobDone { run_id, .. } => *run_id,
        }
    }

    pub fn job_start(run_id: u64, restart: bool, source_fingerprint: Option<String>) -> Self {
        ExecutionEvent::JobStart {
            run_id,
            restart,
            source_fingerprint,
            at: Utc::now(),
        }
    }

    pub fn job_done(run_id: u64, status: JobStatus) -> Self {
        ExecutionEvent::JobDone {
            run_id,
            status,
            at: Utc::now(),
        }
    }
}
