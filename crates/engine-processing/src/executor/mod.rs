use crate::{
    error::StepError,
    executor::{
        chunk::{ChunkOutcome, ChunkWorker},
        tracker::CheckpointTracker,
    },
};
use engine_config::settings::{JobSettings, WriteFailurePolicy};
use engine_core::{
    connectors::{
        listener::SkipListener,
        processor::ItemProcessor,
        sink::ItemWriter,
        source::{SourcePosition, SynchronizedReader},
    },
    error::ReadError,
    metrics::StepCounters,
    state::{StateStore, models::ExecutionEvent},
};
use futures::{FutureExt, StreamExt, stream::FuturesUnordered};
use model::execution::{
    checkpoint::Checkpoint,
    result::{StepResult, StepStatus},
    skip::SkipPhase,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod chunk;
#[cfg(test)]
mod tests;
pub mod tracker;

/// Chunking, skip and concurrency limits of one step.
#[derive(Debug, Clone)]
pub struct StepConfig {
    pub chunk_size: usize,
    pub skip_limit: u64,
    pub concurrency: usize,
    pub write_failure: WriteFailurePolicy,
    /// When unset, an unfinished checkpoint is ignored and the step reruns
    /// from the start of its source with fresh output.
    pub resumable: bool,
}

impl StepConfig {
    pub fn from_settings(settings: &JobSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            skip_limit: settings.skip_limit,
            concurrency: settings.workers(),
            write_failure: settings.write_failure,
            resumable: true,
        }
    }
}

impl Default for StepConfig {
    fn default() -> Self {
        Self::from_settings(&JobSettings::default())
    }
}

/// A (source, transform, sink) triple under a step name.
pub struct ChunkStep<I, O> {
    pub name: String,
    pub reader: SynchronizedReader<I>,
    pub processor: Arc<dyn ItemProcessor<I, O>>,
    pub writer: Arc<dyn ItemWriter<O>>,
}

/// Job-wide collaborators shared by every step of a run.
#[derive(Clone)]
pub struct StepContext {
    pub run_id: u64,
    pub state: Arc<dyn StateStore>,
    pub listener: Arc<dyn SkipListener>,
    pub cancel: CancellationToken,
}

enum Terminal {
    Completed,
    Failed(StepError),
    Stopped,
}

/// Executor states. Reads happen only in `Running`; `Draining` waits for
/// in-flight chunks without admitting new ones.
enum Phase {
    Open,
    Running,
    Draining(Terminal),
    Done(Terminal),
}

enum ChunkRead<I> {
    Chunk {
        items: Vec<I>,
        position: SourcePosition,
        end_of_stream: bool,
    },
    SkipLimitReached,
    Fatal(ReadError),
}

pub struct ChunkStepExecutor {
    config: StepConfig,
}

impl ChunkStepExecutor {
    pub fn new(config: StepConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StepConfig {
        &self.config
    }

    /// Drives `step` to a terminal state. Never returns an error: failures
    /// end up in the result's status and `failure`.
    pub async fn execute<I, O>(&self, step: ChunkStep<I, O>, ctx: &StepContext) -> StepResult
    where
        I: Serialize + Send + Sync + 'static,
        O: Serialize + Send + Sync + 'static,
    {
        let mut run = StepRun::new(&self.config, step, ctx);
        let mut phase = Phase::Open;

        loop {
            phase = match phase {
                Phase::Open => run.open().await,
                Phase::Running => run.admit_next().await,
                Phase::Draining(terminal) => run.drain(terminal).await,
                Phase::Done(terminal) => return run.finish(terminal).await,
            };
        }
    }
}

/// State of one step execution.
struct StepRun<'a, I, O> {
    config: &'a StepConfig,
    ctx: &'a StepContext,
    name: String,
    reader: SynchronizedReader<I>,
    writer: Arc<dyn ItemWriter<O>>,
    worker: Arc<ChunkWorker<I, O>>,
    counters: StepCounters,
    tracker: CheckpointTracker,
    in_flight: FuturesUnordered<JoinHandle<ChunkOutcome>>,
    next_seq: u64,
    failure: Option<StepError>,
    opened: bool,
}

impl<'a, I, O> StepRun<'a, I, O>
where
    I: Serialize + Send + Sync + 'static,
    O: Serialize + Send + Sync + 'static,
{
    fn new(config: &'a StepConfig, step: ChunkStep<I, O>, ctx: &'a StepContext) -> Self {
        let counters = StepCounters::new();
        let worker = Arc::new(ChunkWorker {
            run_id: ctx.run_id,
            step: step.name.clone(),
            processor: step.processor,
            writer: step.writer.clone(),
            listener: ctx.listener.clone(),
            counters: counters.clone(),
            skip_limit: config.skip_limit,
            write_failure: config.write_failure,
        });

        Self {
            config,
            ctx,
            name: step.name,
            reader: step.reader,
            writer: step.writer,
            worker,
            counters,
            tracker: CheckpointTracker::new(0),
            in_flight: FuturesUnordered::new(),
            next_seq: 0,
            failure: None,
            opened: false,
        }
    }

    async fn open(&mut self) -> Phase {
        let checkpoint = match self.ctx.state.get_checkpoint(self.ctx.run_id, &self.name).await {
            Ok(cp) => cp,
            Err(e) => return Phase::Done(Terminal::Failed(e.into())),
        };

        if let Some(cp) = checkpoint.as_ref().filter(|cp| cp.finished) {
            info!(
                run_id = self.ctx.run_id,
                step = %self.name,
                cursor = %cp.cursor,
                "Step already finished in this run, nothing to do"
            );
            return Phase::Done(Terminal::Completed);
        }

        let checkpoint = match checkpoint {
            Some(cp) if !self.config.resumable => {
                info!(
                    run_id = self.ctx.run_id,
                    step = %self.name,
                    cursor = %cp.cursor,
                    "Step is not resumable, restarting from the beginning"
                );
                None
            }
            other => other,
        };

        if let Err(e) = self.reader.open(checkpoint.as_ref()).await {
            return Phase::Done(Terminal::Failed(e.into()));
        }
        self.opened = true;

        if let Err(e) = self.writer.open(checkpoint.is_some()).await {
            return Phase::Done(Terminal::Failed(StepError::WriterOpen(e)));
        }

        self.tracker = CheckpointTracker::new(
            checkpoint.as_ref().map_or(0, |cp| cp.items_committed),
        );

        let event = ExecutionEvent::StepStart {
            run_id: self.ctx.run_id,
            step: self.name.clone(),
            resume_from: checkpoint.as_ref().map(|cp| cp.cursor.clone()),
        };
        if let Err(e) = self.ctx.state.append_event(&event).await {
            return Phase::Done(Terminal::Failed(e.into()));
        }

        let source = self.reader.name().await;
        info!(
            run_id = self.ctx.run_id,
            step = %self.name,
            source = %source,
            writer = self.writer.name(),
            chunk_size = self.config.chunk_size,
            workers = self.config.concurrency,
            skip_limit = self.config.skip_limit,
            resume_from = ?checkpoint.as_ref().map(|cp| &cp.cursor),
            "Step started"
        );
        Phase::Running
    }

    /// One admission decision: collect finished chunks, checkpoint, then
    /// either read and dispatch the next chunk or leave `Running`.
    async fn admit_next(&mut self) -> Phase {
        while let Some(Some(joined)) = self.in_flight.next().now_or_never() {
            self.on_chunk_done(joined).await;
        }
        self.persist_watermark().await;

        if let Some(err) = self.failure.take() {
            return Phase::Draining(Terminal::Failed(err));
        }
        if self.skip_limit_exceeded() {
            return Phase::Draining(Terminal::Failed(self.skip_limit_error()));
        }
        if self.ctx.cancel.is_cancelled() {
            warn!(step = %self.name, "Stop requested, no further chunks will start");
            return Phase::Draining(Terminal::Stopped);
        }

        if self.in_flight.len() >= self.config.concurrency.max(1) {
            if let Some(joined) = self.in_flight.next().await {
                self.on_chunk_done(joined).await;
            }
            return Phase::Running;
        }

        match self.read_chunk().await {
            ChunkRead::Fatal(e) => {
                error!(step = %self.name, error = %e, "Source failed");
                Phase::Draining(Terminal::Failed(e.into()))
            }
            ChunkRead::SkipLimitReached => Phase::Draining(Terminal::Failed(self.skip_limit_error())),
            ChunkRead::Chunk {
                items,
                position,
                end_of_stream,
            } => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.tracker.register(seq, position);

                if items.is_empty() {
                    self.tracker.committed(seq, 0);
                } else {
                    self.counters.add_read(items.len() as u64);
                    let worker = self.worker.clone();
                    self.in_flight.push(tokio::spawn(worker.run(seq, items)));
                }

                if end_of_stream {
                    info!(step = %self.name, chunks = self.next_seq, "Source exhausted");
                    Phase::Draining(Terminal::Completed)
                } else {
                    Phase::Running
                }
            }
        }
    }

    /// Reads up to one chunk while holding the reader, then snapshots its
    /// position before releasing it.
    async fn read_chunk(&self) -> ChunkRead<I> {
        let mut reader = self.reader.lock().await;
        let mut items = Vec::with_capacity(self.config.chunk_size);
        let mut end_of_stream = false;

        while items.len() < self.config.chunk_size {
            match reader.read().await {
                Ok(Some(item)) => items.push(item),
                Ok(None) => {
                    end_of_stream = true;
                    break;
                }
                Err(e) if e.is_skippable() => {
                    let total = self
                        .worker
                        .report_skip(SkipPhase::Read, e.to_string(), e.snapshot())
                        .await;
                    if total > self.config.skip_limit {
                        return ChunkRead::SkipLimitReached;
                    }
                }
                Err(e) => return ChunkRead::Fatal(e),
            }
        }

        ChunkRead::Chunk {
            items,
            position: reader.checkpoint(),
            end_of_stream,
        }
    }

    async fn drain(&mut self, terminal: Terminal) -> Phase {
        if !self.in_flight.is_empty() {
            info!(step = %self.name, in_flight = self.in_flight.len(), "Waiting for in-flight chunks");
        }
        while let Some(joined) = self.in_flight.next().await {
            self.on_chunk_done(joined).await;
        }
        self.persist_watermark().await;

        let terminal = match (terminal, self.failure.take()) {
            (Terminal::Failed(first), _) => Terminal::Failed(first),
            (_, Some(err)) => Terminal::Failed(err),
            (Terminal::Completed, None) if self.skip_limit_exceeded() => {
                Terminal::Failed(self.skip_limit_error())
            }
            (other, None) => other,
        };
        Phase::Done(terminal)
    }

    async fn finish(&mut self, terminal: Terminal) -> StepResult {
        let mut terminal = terminal;

        if self.opened {
            if let Err(e) = self.reader.close().await {
                warn!(step = %self.name, error = %e, "Failed to close source");
            }
            if let Err(e) = self.writer.close().await {
                error!(step = %self.name, error = %e, "Failed to close writer");
                if matches!(terminal, Terminal::Completed) {
                    terminal = Terminal::Failed(StepError::ChunkCommit {
                        seq: self.next_seq.saturating_sub(1),
                        source: e,
                    });
                }
            }
        }

        let (status, failure) = match terminal {
            Terminal::Completed => (StepStatus::Completed, None),
            Terminal::Stopped => (StepStatus::Stopped, None),
            Terminal::Failed(e) => (StepStatus::Failed, Some(e.to_string())),
        };
        let result = self.counters.snapshot().into_result(&self.name, status, failure);

        let event = ExecutionEvent::StepDone {
            run_id: self.ctx.run_id,
            result: result.clone(),
        };
        if let Err(e) = self.ctx.state.append_event(&event).await {
            warn!(step = %self.name, error = %e, "Failed to record step completion");
        }

        match result.status {
            StepStatus::Completed => info!(
                run_id = self.ctx.run_id,
                step = %self.name,
                read = result.items_read,
                filtered = result.items_filtered,
                written = result.items_written,
                skipped = result.items_skipped,
                chunks = result.chunks_committed,
                "Step completed"
            ),
            StepStatus::Stopped => warn!(
                run_id = self.ctx.run_id,
                step = %self.name,
                written = result.items_written,
                "Step stopped"
            ),
            StepStatus::Failed => error!(
                run_id = self.ctx.run_id,
                step = %self.name,
                read = result.items_read,
                written = result.items_written,
                skipped = result.items_skipped,
                reason = result.failure.as_deref().unwrap_or_default(),
                "Step failed"
            ),
        }
        result
    }

    async fn on_chunk_done(&mut self, joined: Result<ChunkOutcome, JoinError>) {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(step = %self.name, error = %e, "Chunk worker aborted");
                self.failure.get_or_insert(StepError::Worker(e.to_string()));
                return;
            }
        };

        match outcome.result {
            Ok(()) => {
                self.tracker.committed(outcome.seq, outcome.written);
                let event = ExecutionEvent::ChunkCommitted {
                    run_id: self.ctx.run_id,
                    step: self.name.clone(),
                    seq: outcome.seq,
                    items: outcome.written,
                };
                if let Err(e) = self.ctx.state.append_event(&event).await {
                    warn!(step = %self.name, chunk = outcome.seq, error = %e, "Failed to log chunk commit");
                }
            }
            Err(source) => {
                error!(step = %self.name, chunk = outcome.seq, error = %source, "Chunk write failed");
                self.tracker.failed(outcome.seq);
                self.failure.get_or_insert(StepError::ChunkCommit {
                    seq: outcome.seq,
                    source,
                });
            }
        }
    }

    async fn persist_watermark(&mut self) {
        let Some(position) = self.tracker.advance() else {
            return;
        };

        let checkpoint = Checkpoint::new(
            self.ctx.run_id,
            &self.name,
            position.cursor,
            position.finished,
        )
        .with_items_committed(self.tracker.items_committed());

        if let Err(e) = self.ctx.state.put_checkpoint(&checkpoint).await {
            error!(step = %self.name, error = %e, "Failed to persist checkpoint");
            self.failure.get_or_insert(e.into());
        }
    }

    fn skip_limit_exceeded(&self) -> bool {
        self.counters.skipped() > self.config.skip_limit
    }

    fn skip_limit_error(&self) -> StepError {
        StepError::SkipLimitExceeded {
            skipped: self.counters.skipped(),
            limit: self.config.skip_limit,
        }
    }
}
