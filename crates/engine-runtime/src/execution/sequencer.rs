use crate::error::JobError;
use async_trait::async_trait;
use engine_core::{
    connectors::listener::SkipListener,
    state::{StateStore, models::ExecutionEvent},
};
use engine_processing::executor::{ChunkStep, ChunkStepExecutor, StepContext};
use model::execution::{
    params::JobParameters,
    result::{JobResult, JobStatus, StepResult},
};
use serde::Serialize;
use std::{path::Path, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A unit of work in a job.
#[async_trait]
pub trait JobStep: Send {
    fn name(&self) -> &str;

    async fn execute(self: Box<Self>, ctx: &StepContext) -> StepResult;
}

/// A chunk-oriented step bound to its executor.
pub struct ChunkJobStep<I, O> {
    step: ChunkStep<I, O>,
    executor: ChunkStepExecutor,
}

impl<I, O> ChunkJobStep<I, O> {
    pub fn new(step: ChunkStep<I, O>, executor: ChunkStepExecutor) -> Self {
        Self { step, executor }
    }
}

#[async_trait]
impl<I, O> JobStep for ChunkJobStep<I, O>
where
    I: Serialize + Send + Sync + 'static,
    O: Serialize + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.step.name
    }

    async fn execute(self: Box<Self>, ctx: &StepContext) -> StepResult {
        let this = *self;
        this.executor.execute(this.step, ctx).await
    }
}

/// Runs steps in order under one run id, halting at the first step that
/// does not complete.
pub struct JobSequencer {
    state: Arc<dyn StateStore>,
    listener: Arc<dyn SkipListener>,
    cancel: CancellationToken,
}

impl JobSequencer {
    pub fn new(
        state: Arc<dyn StateStore>,
        listener: Arc<dyn SkipListener>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            state,
            listener,
            cancel,
        }
    }

    pub async fn run(
        &self,
        steps: Vec<Box<dyn JobStep>>,
        params: &JobParameters,
    ) -> Result<JobResult, JobError> {
        params.validate()?;

        let fingerprint = fingerprint(&params.source_file_path).await?;
        let run_id = self.resolve_run_id(params, fingerprint.as_deref()).await?;
        let restart = params.restart_run_id.is_some();

        self.state
            .append_event(&ExecutionEvent::job_start(run_id, restart, fingerprint))
            .await?;
        info!(
            run_id,
            restart,
            source = %params.source_file_path.display(),
            output = %params.output_file_path.display(),
            started_at = %params.run_timestamp,
            "Job started"
        );

        let ctx = StepContext {
            run_id,
            state: self.state.clone(),
            listener: self.listener.clone(),
            cancel: self.cancel.clone(),
        };

        let total = steps.len();
        let mut results = Vec::with_capacity(total);
        let mut status = JobStatus::Completed;

        for (idx, step) in steps.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(run_id, step = step.name(), "Stop requested before step start");
                status = JobStatus::Stopped;
                break;
            }

            info!(run_id, step = step.name(), "Running step {}/{}", idx + 1, total);
            let result = step.execute(&ctx).await;
            let completed = result.is_completed();
            let step_status = result.status;
            results.push(result);

            if !completed {
                status = step_status.into();
                break;
            }
        }

        self.state
            .append_event(&ExecutionEvent::job_done(run_id, status))
            .await?;

        match status {
            JobStatus::Completed => info!(run_id, "Job completed"),
            JobStatus::Stopped => warn!(run_id, "Job stopped; restart with the same run id to resume"),
            JobStatus::Failed => error!(run_id, "Job failed; restart with the same run id to resume"),
        }

        Ok(JobResult {
            run_id,
            status,
            steps: results,
        })
    }

    /// Allocates a new run id, or checks that a restarted run exists and
    /// still reads the same input.
    async fn resolve_run_id(
        &self,
        params: &JobParameters,
        fingerprint: Option<&str>,
    ) -> Result<u64, JobError> {
        let Some(run_id) = params.restart_run_id else {
            return Ok(self.state.next_run_id().await?);
        };

        let events = self.state.events(run_id).await?;
        if events.is_empty() {
            return Err(JobError::UnknownRun(run_id));
        }

        let recorded = events.iter().find_map(|e| match e {
            ExecutionEvent::JobStart {
                source_fingerprint, ..
            } => source_fingerprint.clone(),
            _ => None,
        });
        if let (Some(expected), Some(found)) = (recorded, fingerprint)
            && expected != found
        {
            return Err(JobError::SourceChanged {
                run_id,
                expected,
                found: found.to_string(),
            });
        }

        info!(run_id, "Restarting run");
        Ok(run_id)
    }
}

/// blake3 digest of the file at `path`, or `None` if it does not exist.
pub async fn fingerprint(path: &Path) -> Result<Option<String>, JobError> {
    let path = path.to_path_buf();
    let digest = tokio::task::spawn_blocking(move || -> std::io::Result<Option<String>> {
        let file = match std::fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut hasher = blake3::Hasher::new();
        hasher.update_reader(file)?;
        Ok(Some(hasher.finalize().to_hex().to_string()))
    })
    .await??;
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::state::memory::MemoryStateStore;
    use model::{execution::result::StepStatus, execution::skip::SkipRecord};
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct NoopListener;

    #[async_trait]
    impl SkipListener for NoopListener {
        async fn on_skip(&self, _record: &SkipRecord) {}
    }

    struct FixedStep {
        name: &'static str,
        status: StepStatus,
        ran: Arc<Mutex<Vec<(String, u64)>>>,
    }

    #[async_trait]
    impl JobStep for FixedStep {
        fn name(&self) -> &str {
            self.name
        }

        async fn execute(self: Box<Self>, ctx: &StepContext) -> StepResult {
            self.ran.lock().unwrap().push((self.name.to_string(), ctx.run_id));
            StepResult {
                step: self.name.to_string(),
                items_read: 0,
                items_filtered: 0,
                items_written: 0,
                items_skipped: 0,
                chunks_committed: 0,
                status: self.status,
                failure: None,
            }
        }
    }

    fn steps(
        statuses: &[(&'static str, StepStatus)],
        ran: &Arc<Mutex<Vec<(String, u64)>>>,
    ) -> Vec<Box<dyn JobStep>> {
        statuses
            .iter()
            .map(|(name, status)| {
                Box::new(FixedStep {
                    name: *name,
                    status: *status,
                    ran: ran.clone(),
                }) as Box<dyn JobStep>
            })
            .collect()
    }

    fn sequencer(state: &Arc<MemoryStateStore>) -> JobSequencer {
        JobSequencer::new(state.clone(), Arc::new(NoopListener), CancellationToken::new())
    }

    fn params(dir: &Path) -> JobParameters {
        let input = dir.join("input.csv");
        std::fs::write(&input, "firstName,lastName,email,age\n").unwrap();
        JobParameters::new(input, dir.join("out.csv"))
    }

    #[tokio::test]
    async fn failed_step_halts_the_job() {
        let dir = tempdir().unwrap();
        let state = Arc::new(MemoryStateStore::new());
        let ran = Arc::new(Mutex::new(Vec::new()));

        let result = sequencer(&state)
            .run(
                steps(
                    &[
                        ("first", StepStatus::Completed),
                        ("second", StepStatus::Failed),
                        ("third", StepStatus::Completed),
                    ],
                    &ran,
                ),
                &params(dir.path()),
            )
            .await
            .unwrap();

        assert_eq!(result.status, JobStatus::Failed);
        assert_eq!(result.steps.len(), 2);
        let names: Vec<_> = ran.lock().unwrap().iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn each_run_gets_a_new_id_unless_restarted() {
        let dir = tempdir().unwrap();
        let state = Arc::new(MemoryStateStore::new());
        let ran = Arc::new(Mutex::new(Vec::new()));
        let seq = sequencer(&state);
        let ok = [("only", StepStatus::Completed)];

        let first = seq.run(steps(&ok, &ran), &params(dir.path())).await.unwrap();
        let second = seq.run(steps(&ok, &ran), &params(dir.path())).await.unwrap();
        let again = seq
            .run(steps(&ok, &ran), &params(dir.path()).restart(first.run_id))
            .await
            .unwrap();

        assert!(second.run_id > first.run_id);
        assert_eq!(again.run_id, first.run_id);
        assert_eq!(state.events(first.run_id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn restart_of_unknown_run_is_rejected() {
        let dir = tempdir().unwrap();
        let state = Arc::new(MemoryStateStore::new());
        let ran = Arc::new(Mutex::new(Vec::new()));

        let err = sequencer(&state)
            .run(
                steps(&[("only", StepStatus::Completed)], &ran),
                &params(dir.path()).restart(7),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::UnknownRun(7)));
        assert!(ran.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn restart_with_changed_input_is_rejected() {
        let dir = tempdir().unwrap();
        let state = Arc::new(MemoryStateStore::new());
        let ran = Arc::new(Mutex::new(Vec::new()));
        let seq = sequencer(&state);

        let first = seq
            .run(steps(&[("only", StepStatus::Failed)], &ran), &params(dir.path()))
            .await
            .unwrap();

        let changed = params(dir.path()).restart(first.run_id);
        std::fs::write(&changed.source_file_path, "firstName,lastName,email,age\na,b,c@d,1\n")
            .unwrap();

        let err = seq
            .run(steps(&[("only", StepStatus::Completed)], &ran), &changed)
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::SourceChanged { .. }));
    }

    #[tokio::test]
    async fn invalid_parameters_fail_before_any_step() {
        let state = Arc::new(MemoryStateStore::new());
        let ran = Arc::new(Mutex::new(Vec::new()));

        let err = sequencer(&state)
            .run(
                steps(&[("only", StepStatus::Completed)], &ran),
                &JobParameters::new("", "out.csv"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, JobError::Parameters(_)));
        assert!(ran.lock().unwrap().is_empty());
        assert_eq!(state.last_run_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn cancelled_job_stops_before_next_step() {
        let dir = tempdir().unwrap();
        let state = Arc::new(MemoryStateStore::new());
        let ran = Arc::new(Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = JobSequencer::new(state.clone(), Arc::new(NoopListener), cancel)
            .run(
                steps(&[("only", StepStatus::Completed)], &ran),
                &params(dir.path()),
            )
            .await
            .unwrap();

        assert_eq!(result.status, JobStatus::Stopped);
        assert!(result.steps.is_empty());
    }
}
