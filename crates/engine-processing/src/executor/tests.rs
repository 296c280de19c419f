use super::*;
use async_trait::async_trait;
use engine_core::{
    connectors::source::{ItemReader, SourcePosition},
    error::{ProcessError, WriteError},
    state::memory::MemoryStateStore,
};
use model::{
    execution::{checkpoint::Checkpoint, skip::SkipRecord},
    pagination::cursor::Cursor,
};
use std::{collections::HashSet, sync::Mutex};

/// Offset-checkpointed reader over a fixed list; `Err` entries are malformed lines.
struct ListReader {
    items: Vec<Result<u32, String>>,
    next: usize,
    finished: bool,
}

impl ListReader {
    fn new(items: Vec<Result<u32, String>>) -> Self {
        Self {
            items,
            next: 0,
            finished: false,
        }
    }

    fn numbers(n: u32) -> Self {
        Self::new((0..n).map(Ok).collect())
    }
}

#[async_trait]
impl ItemReader<u32> for ListReader {
    async fn open(&mut self, checkpoint: Option<&Checkpoint>) -> Result<(), ReadError> {
        self.next = checkpoint.map_or(0, |cp| cp.cursor.offset() as usize);
        self.finished = false;
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<u32>, ReadError> {
        let Some(item) = self.items.get(self.next).cloned() else {
            self.finished = true;
            return Ok(None);
        };
        self.next += 1;
        item.map(Some).map_err(|raw| ReadError::Malformed {
            raw: Some(raw),
            reason: "bad line".into(),
        })
    }

    fn checkpoint(&self) -> SourcePosition {
        SourcePosition {
            cursor: Cursor::Offset {
                offset: self.next as u64,
            },
            finished: self.finished,
        }
    }

    fn name(&self) -> &str {
        "list"
    }
}

/// Fails on the listed values, drops odd values when `drop_odd` is set.
#[derive(Default)]
struct TestProcessor {
    fail_on: HashSet<u32>,
    drop_odd: bool,
}

#[async_trait]
impl ItemProcessor<u32, u32> for TestProcessor {
    async fn process(&self, item: &u32) -> Result<Option<u32>, ProcessError> {
        if self.fail_on.contains(item) {
            return Err(ProcessError::InvalidField {
                field: "item",
                reason: format!("cannot process {item}"),
            });
        }
        if self.drop_odd && item % 2 == 1 {
            return Ok(None);
        }
        Ok(Some(*item))
    }
}

/// Collects committed chunks; a chunk containing a value in `fail_on` fails.
#[derive(Default)]
struct CollectingWriter {
    chunks: Mutex<Vec<Vec<u32>>>,
    fail_on: HashSet<u32>,
    opened_resuming: Mutex<Option<bool>>,
    /// When set, asserts that the stored checkpoint covers exactly the items
    /// of previously committed chunks.
    checkpoint_watch: Option<(Arc<MemoryStateStore>, u64)>,
}

impl CollectingWriter {
    fn items(&self) -> Vec<u32> {
        let mut all: Vec<u32> = self.chunks.lock().unwrap().concat();
        all.sort();
        all
    }
}

#[async_trait]
impl ItemWriter<u32> for CollectingWriter {
    async fn open(&self, resuming: bool) -> Result<(), WriteError> {
        *self.opened_resuming.lock().unwrap() = Some(resuming);
        Ok(())
    }

    async fn write(&self, items: Vec<u32>) -> Result<usize, WriteError> {
        if let Some((state, run_id)) = &self.checkpoint_watch {
            let stored = state
                .get_checkpoint(*run_id, "numbers")
                .await
                .unwrap()
                .map_or(0, |cp| cp.cursor.offset());
            let committed: usize = self.chunks.lock().unwrap().iter().map(Vec::len).sum();
            assert_eq!(stored, committed as u64);
        }
        if items.iter().any(|i| self.fail_on.contains(i)) {
            return Err(WriteError::Serialization("injected".into()));
        }
        let n = items.len();
        self.chunks.lock().unwrap().push(items);
        Ok(n)
    }

    fn name(&self) -> &str {
        "collect"
    }
}

#[derive(Default)]
struct RecordingListener {
    records: Mutex<Vec<SkipRecord>>,
}

impl RecordingListener {
    fn phases(&self) -> Vec<SkipPhase> {
        self.records.lock().unwrap().iter().map(|r| r.phase).collect()
    }
}

#[async_trait]
impl SkipListener for RecordingListener {
    async fn on_skip(&self, record: &SkipRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

struct Harness {
    state: Arc<MemoryStateStore>,
    listener: Arc<RecordingListener>,
    ctx: StepContext,
}

impl Harness {
    fn new(run_id: u64) -> Self {
        let state = Arc::new(MemoryStateStore::new());
        let listener = Arc::new(RecordingListener::default());
        let ctx = StepContext {
            run_id,
            state: state.clone(),
            listener: listener.clone(),
            cancel: CancellationToken::new(),
        };
        Self {
            state,
            listener,
            ctx,
        }
    }

    async fn run(
        &self,
        config: StepConfig,
        reader: ListReader,
        processor: TestProcessor,
        writer: Arc<CollectingWriter>,
    ) -> StepResult {
        let step = ChunkStep {
            name: "numbers".to_string(),
            reader: SynchronizedReader::new(Box::new(reader)),
            processor: Arc::new(processor),
            writer,
        };
        ChunkStepExecutor::new(config).execute(step, &self.ctx).await
    }

    async fn checkpoint(&self) -> Option<Checkpoint> {
        self.state
            .get_checkpoint(self.ctx.run_id, "numbers")
            .await
            .unwrap()
    }
}

fn config(chunk_size: usize, skip_limit: u64, concurrency: usize) -> StepConfig {
    StepConfig {
        chunk_size,
        skip_limit,
        concurrency,
        write_failure: WriteFailurePolicy::Fail,
        resumable: true,
    }
}

fn failing(values: &[u32]) -> TestProcessor {
    TestProcessor {
        fail_on: values.iter().copied().collect(),
        drop_odd: false,
    }
}

#[tokio::test]
async fn completes_and_marks_checkpoint_finished() {
    let h = Harness::new(1);
    let writer = Arc::new(CollectingWriter::default());

    let result = h
        .run(config(3, 0, 1), ListReader::numbers(10), TestProcessor::default(), writer.clone())
        .await;

    assert_eq!(result.status, StepStatus::Completed);
    assert_eq!(result.items_read, 10);
    assert_eq!(result.items_written, 10);
    assert_eq!(result.chunks_committed, 4);
    assert_eq!(writer.items(), (0..10).collect::<Vec<_>>());
    assert_eq!(*writer.opened_resuming.lock().unwrap(), Some(false));

    let cp = h.checkpoint().await.unwrap();
    assert_eq!(cp.cursor, Cursor::Offset { offset: 10 });
    assert!(cp.finished);
    assert_eq!(cp.items_committed, 10);
}

#[tokio::test]
async fn skip_limit_two_with_three_failures_fails() {
    let h = Harness::new(1);
    let result = h
        .run(
            config(2, 2, 1),
            ListReader::numbers(10),
            failing(&[1, 4, 7]),
            Arc::new(CollectingWriter::default()),
        )
        .await;

    assert_eq!(result.status, StepStatus::Failed);
    assert_eq!(result.items_skipped, 3);
    assert!(result.failure.unwrap().contains("Skip limit"));
    assert_eq!(h.listener.phases(), vec![SkipPhase::Process; 3]);

    // The chunk holding the third failure committed; nothing after it started.
    let cp = h.checkpoint().await.unwrap();
    assert_eq!(cp.cursor, Cursor::Offset { offset: 8 });
    assert!(!cp.finished);
}

#[tokio::test]
async fn skip_limit_five_with_three_failures_completes() {
    let h = Harness::new(1);
    let writer = Arc::new(CollectingWriter::default());
    let result = h
        .run(config(2, 5, 1), ListReader::numbers(10), failing(&[1, 4, 7]), writer.clone())
        .await;

    assert_eq!(result.status, StepStatus::Completed);
    assert_eq!(result.items_skipped, 3);
    assert_eq!(result.items_written, 7);
    assert_eq!(writer.items(), vec![0, 2, 3, 5, 6, 8, 9]);
}

#[tokio::test]
async fn rejections_are_not_skips() {
    let h = Harness::new(1);
    let processor = TestProcessor {
        drop_odd: true,
        ..Default::default()
    };
    let result = h
        .run(
            config(4, 0, 2),
            ListReader::numbers(9),
            processor,
            Arc::new(CollectingWriter::default()),
        )
        .await;

    assert_eq!(result.status, StepStatus::Completed);
    assert_eq!(result.items_filtered, 4);
    assert_eq!(result.items_skipped, 0);
    assert_eq!(result.items_written, 5);
}

#[tokio::test]
async fn malformed_reads_are_skipped() {
    let h = Harness::new(1);
    let reader = ListReader::new(vec![Ok(1), Err("x,y".into()), Ok(2), Err("z".into())]);
    let writer = Arc::new(CollectingWriter::default());
    let result = h
        .run(config(10, 2, 1), reader, TestProcessor::default(), writer.clone())
        .await;

    assert_eq!(result.status, StepStatus::Completed);
    assert_eq!(result.items_read, 2);
    assert_eq!(result.items_skipped, 2);
    assert_eq!(writer.items(), vec![1, 2]);

    let records = h.listener.records.lock().unwrap();
    assert_eq!(records[0].phase, SkipPhase::Read);
    assert_eq!(records[0].item, Some(serde_json::json!("x,y")));
}

#[tokio::test]
async fn checkpoint_lands_between_commit_and_next_read() {
    let h = Harness::new(3);
    let writer = Arc::new(CollectingWriter {
        checkpoint_watch: Some((h.state.clone(), 3)),
        ..Default::default()
    });

    let result = h
        .run(config(2, 0, 1), ListReader::numbers(7), TestProcessor::default(), writer)
        .await;

    assert_eq!(result.status, StepStatus::Completed);
    assert_eq!(h.checkpoint().await.unwrap().cursor.offset(), 7);
}

#[tokio::test]
async fn write_failure_fails_step_and_pins_checkpoint() {
    let h = Harness::new(1);
    let writer = Arc::new(CollectingWriter {
        fail_on: [5].into_iter().collect(),
        ..Default::default()
    });

    let result = h
        .run(config(2, 100, 1), ListReader::numbers(10), TestProcessor::default(), writer.clone())
        .await;

    assert_eq!(result.status, StepStatus::Failed);
    assert!(result.failure.unwrap().contains("could not be committed"));
    assert_eq!(writer.items(), vec![0, 1, 2, 3]);
    assert_eq!(result.items_skipped, 1);
    assert_eq!(h.listener.phases(), vec![SkipPhase::Write, SkipPhase::Write]);

    let cp = h.checkpoint().await.unwrap();
    assert_eq!(cp.cursor.offset(), 4);
    assert!(!cp.finished);
}

#[tokio::test]
async fn skip_policy_abandons_failed_chunk() {
    let h = Harness::new(1);
    let writer = Arc::new(CollectingWriter {
        fail_on: [5].into_iter().collect(),
        ..Default::default()
    });
    let config = StepConfig {
        write_failure: WriteFailurePolicy::Skip,
        ..config(2, 1, 1)
    };

    let result = h
        .run(config, ListReader::numbers(8), TestProcessor::default(), writer.clone())
        .await;

    assert_eq!(result.status, StepStatus::Completed);
    assert_eq!(result.items_skipped, 1);
    assert_eq!(writer.items(), vec![0, 1, 2, 3, 6, 7]);
    assert_eq!(h.listener.phases(), vec![SkipPhase::Write, SkipPhase::Write]);
    assert!(h.checkpoint().await.unwrap().finished);
}

#[tokio::test]
async fn concurrent_workers_commit_everything() {
    let h = Harness::new(1);
    let writer = Arc::new(CollectingWriter::default());

    let result = h
        .run(config(7, 0, 4), ListReader::numbers(500), TestProcessor::default(), writer.clone())
        .await;

    assert_eq!(result.status, StepStatus::Completed);
    assert_eq!(result.items_written, 500);
    assert_eq!(writer.items(), (0..500).collect::<Vec<_>>());

    let cp = h.checkpoint().await.unwrap();
    assert_eq!(cp.cursor.offset(), 500);
    assert!(cp.finished);
    assert_eq!(cp.items_committed, 500);
}

#[tokio::test]
async fn resumes_from_stored_checkpoint() {
    let h = Harness::new(9);
    h.state
        .put_checkpoint(
            &Checkpoint::new(9, "numbers", Cursor::Offset { offset: 6 }, false)
                .with_items_committed(6),
        )
        .await
        .unwrap();
    let writer = Arc::new(CollectingWriter::default());

    let result = h
        .run(config(3, 0, 1), ListReader::numbers(10), TestProcessor::default(), writer.clone())
        .await;

    assert_eq!(result.items_read, 4);
    assert_eq!(writer.items(), vec![6, 7, 8, 9]);
    assert_eq!(*writer.opened_resuming.lock().unwrap(), Some(true));
    assert_eq!(h.checkpoint().await.unwrap().items_committed, 10);
}

#[tokio::test]
async fn non_resumable_step_reruns_from_the_start() {
    let h = Harness::new(4);
    h.state
        .put_checkpoint(
            &Checkpoint::new(4, "numbers", Cursor::Offset { offset: 6 }, false)
                .with_items_committed(6),
        )
        .await
        .unwrap();
    let writer = Arc::new(CollectingWriter::default());
    let config = StepConfig {
        resumable: false,
        ..config(3, 0, 1)
    };

    let result = h
        .run(config, ListReader::numbers(10), TestProcessor::default(), writer.clone())
        .await;

    assert_eq!(result.status, StepStatus::Completed);
    assert_eq!(result.items_read, 10);
    assert_eq!(writer.items(), (0..10).collect::<Vec<_>>());
    assert_eq!(*writer.opened_resuming.lock().unwrap(), Some(false));

    let cp = h.checkpoint().await.unwrap();
    assert_eq!(cp.items_committed, 10);
    assert!(cp.finished);
}

#[tokio::test]
async fn finished_checkpoint_skips_the_step() {
    let h = Harness::new(2);
    h.state
        .put_checkpoint(&Checkpoint::new(2, "numbers", Cursor::Offset { offset: 10 }, true))
        .await
        .unwrap();
    let writer = Arc::new(CollectingWriter::default());

    let result = h
        .run(config(3, 0, 1), ListReader::numbers(10), TestProcessor::default(), writer.clone())
        .await;

    assert_eq!(result.status, StepStatus::Completed);
    assert_eq!(result.items_read, 0);
    assert!(writer.items().is_empty());
    assert_eq!(*writer.opened_resuming.lock().unwrap(), None);
}

#[tokio::test]
async fn cancellation_stops_admission() {
    let h = Harness::new(1);
    h.ctx.cancel.cancel();
    let writer = Arc::new(CollectingWriter::default());

    let result = h
        .run(config(3, 0, 1), ListReader::numbers(10), TestProcessor::default(), writer.clone())
        .await;

    assert_eq!(result.status, StepStatus::Stopped);
    assert_eq!(result.items_read, 0);
    assert!(h.checkpoint().await.is_none());
}

#[tokio::test]
async fn step_runs_on_a_spawned_task() {
    let h = Harness::new(1);
    let ctx = h.ctx.clone();
    let writer = Arc::new(CollectingWriter::default());
    let step = ChunkStep {
        name: "numbers".to_string(),
        reader: SynchronizedReader::new(Box::new(ListReader::numbers(4))),
        processor: Arc::new(TestProcessor::default()),
        writer: writer.clone(),
    };

    let result = tokio::spawn(async move {
        ChunkStepExecutor::new(config(2, 0, 1))
            .execute(step, &ctx)
            .await
    })
    .await
    .unwrap();

    assert_eq!(result.status, StepStatus::Completed);
    assert_eq!(writer.items(), vec![0, 1, 2, 3]);
}
