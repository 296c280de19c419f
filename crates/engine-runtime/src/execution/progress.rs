use crate::error::JobError;
use engine_core::state::{StateStore, models::ExecutionEvent};
use model::execution::{
    checkpoint::Checkpoint,
    result::{JobStatus, StepResult},
};
use serde::Serialize;

/// What the state store knows about one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunProgress {
    pub run_id: u64,
    /// Terminal status of the latest attempt, if it finished.
    pub status: Option<JobStatus>,
    pub attempts: usize,
    pub checkpoints: Vec<Checkpoint>,
    /// Results of the steps of every attempt, in execution order.
    pub steps: Vec<StepResult>,
    pub chunks_committed: usize,
}

/// Summarizes `run_id`, or the most recent run when `None`.
pub async fn inspect(state: &dyn StateStore, run_id: Option<u64>) -> Result<RunProgress, JobError> {
    let run_id = match run_id {
        Some(id) => id,
        None => state
            .last_run_id()
            .await?
            .ok_or_else(|| JobError::Initialization("No runs recorded yet".into()))?,
    };

    let events = state.events(run_id).await?;
    if events.is_empty() {
        return Err(JobError::UnknownRun(run_id));
    }

    let mut progress = RunProgress {
        run_id,
        status: None,
        attempts: 0,
        checkpoints: state.checkpoints(run_id).await?,
        steps: Vec::new(),
        chunks_committed: 0,
    };

    for event in events {
        match event {
            ExecutionEvent::JobStart { .. } => {
                progress.attempts += 1;
                progress.status = None;
            }
            ExecutionEvent::StepStart { .. } => {}
            ExecutionEvent::ChunkCommitted { .. } => progress.chunks_committed += 1,
            ExecutionEvent::StepDone { result, .. } => progress.steps.push(result),
            ExecutionEvent::JobDone { status, .. } => progress.status = Some(status),
        }
    }

    Ok(progress)
}
