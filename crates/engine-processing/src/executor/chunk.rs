use engine_config::settings::WriteFailurePolicy;
use engine_core::{
    connectors::{listener::SkipListener, processor::ItemProcessor, sink::ItemWriter},
    error::WriteError,
    metrics::StepCounters,
};
use model::execution::skip::{SkipPhase, SkipRecord};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of the transform and write phases of one chunk.
#[derive(Debug)]
pub(crate) struct ChunkOutcome {
    pub seq: u64,
    pub written: u64,
    pub result: Result<(), WriteError>,
}

/// Everything a chunk worker needs; shared by all chunks of a step.
pub(crate) struct ChunkWorker<I, O> {
    pub run_id: u64,
    pub step: String,
    pub processor: Arc<dyn ItemProcessor<I, O>>,
    pub writer: Arc<dyn ItemWriter<O>>,
    pub listener: Arc<dyn SkipListener>,
    pub counters: StepCounters,
    pub skip_limit: u64,
    pub write_failure: WriteFailurePolicy,
}

impl<I, O> ChunkWorker<I, O>
where
    I: Serialize + Send + Sync + 'static,
    O: Serialize + Send + Sync + 'static,
{
    /// Hands the skip to the listener, then counts it. Returns the new total.
    pub async fn report_skip(
        &self,
        phase: SkipPhase,
        cause: String,
        item: Option<serde_json::Value>,
    ) -> u64 {
        let record = SkipRecord::new(self.run_id, &self.step, phase, cause, item);
        self.listener.on_skip(&record).await;
        self.count_skip()
    }

    fn count_skip(&self) -> u64 {
        let total = self.counters.record_skip();
        if total > self.skip_limit {
            warn!(
                step = %self.step,
                skipped = total,
                limit = self.skip_limit,
                "Skip limit exceeded"
            );
        }
        total
    }

    pub async fn run(self: Arc<Self>, seq: u64, items: Vec<I>) -> ChunkOutcome {
        let mut survivors = Vec::with_capacity(items.len());
        let mut filtered = 0u64;

        for item in &items {
            match self.processor.process(item).await {
                Ok(Some(out)) => survivors.push(out),
                Ok(None) => filtered += 1,
                Err(e) => {
                    self.report_skip(
                        SkipPhase::Process,
                        e.to_string(),
                        serde_json::to_value(item).ok(),
                    )
                    .await;
                }
            }
        }
        self.counters.add_filtered(filtered);

        if survivors.is_empty() {
            debug!(step = %self.step, chunk = seq, filtered, "Nothing to write");
            self.counters.add_chunk();
            return ChunkOutcome {
                seq,
                written: 0,
                result: Ok(()),
            };
        }

        let snapshots: Vec<_> = survivors
            .iter()
            .map(|o| serde_json::to_value(o).ok())
            .collect();

        match self.writer.write(survivors).await {
            Ok(written) => {
                let written = written as u64;
                self.counters.add_written(written);
                self.counters.add_chunk();
                debug!(step = %self.step, chunk = seq, written, filtered, "Chunk committed");
                ChunkOutcome {
                    seq,
                    written,
                    result: Ok(()),
                }
            }
            Err(e) => {
                self.report_write_failure(seq, &e, snapshots).await;
                let result = match self.write_failure {
                    WriteFailurePolicy::Skip => {
                        warn!(step = %self.step, chunk = seq, error = %e, "Abandoning chunk after write failure");
                        Ok(())
                    }
                    WriteFailurePolicy::Fail => Err(e),
                };
                ChunkOutcome {
                    seq,
                    written: 0,
                    result,
                }
            }
        }
    }

    /// Every item of a failed chunk reaches the listener; the chunk counts
    /// as one skip.
    async fn report_write_failure(
        &self,
        seq: u64,
        error: &WriteError,
        snapshots: Vec<Option<serde_json::Value>>,
    ) {
        debug!(step = %self.step, chunk = seq, items = snapshots.len(), "Reporting failed chunk");
        let cause = error.to_string();
        for snapshot in snapshots {
            let record = SkipRecord::new(self.run_id, &self.step, SkipPhase::Write, &cause, snapshot);
            self.listener.on_skip(&record).await;
        }
        self.count_skip();
    }
}
