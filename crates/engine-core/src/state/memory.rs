use crate::{
    error::StateStoreError,
    state::{StateStore, models::ExecutionEvent},
};
use async_trait::async_trait;
use model::execution::checkpoint::Checkpoint;
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    checkpoints: BTreeMap<(u64, String), Checkpoint>,
    events: Vec<ExecutionEvent>,
    run_seq: u64,
}

/// Non-durable state store for tests and dry runs.
#[derive(Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn put_checkpoint(&self, cp: &Checkpoint) -> Result<(), StateStoreError> {
        let mut inner = self.inner.lock().await;
        inner
            .checkpoints
            .insert((cp.run_id, cp.step.clone()), cp.clone());
        Ok(())
    }

    async fn get_checkpoint(
        &self,
        run_id: u64,
        step: &str,
    ) -> Result<Option<Checkpoint>, StateStoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.checkpoints.get(&(run_id, step.to_string())).cloned())
    }

    async fn checkpoints(&self, run_id: u64) -> Result<Vec<Checkpoint>, StateStoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .checkpoints
            .range((run_id, String::new())..)
            .take_while(|((run, _), _)| *run == run_id)
            .map(|(_, cp)| cp.clone())
            .collect())
    }

    async fn append_event(&self, event: &ExecutionEvent) -> Result<(), StateStoreError> {
        self.inner.lock().await.events.push(event.clone());
        Ok(())
    }

    async fn events(&self, run_id: u64) -> Result<Vec<ExecutionEvent>, StateStoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .events
            .iter()
            .filter(|e| e.run_id() == run_id)
            .cloned()
            .collect())
    }

    async fn next_run_id(&self) -> Result<u64, StateStoreError> {
        let mut inner = self.inner.lock().await;
        inner.run_seq += 1;
        Ok(inner.run_seq)
    }

    async fn last_run_id(&self) -> Result<Option<u64>, StateStoreError> {
        let inner = self.inner.lock().await;
        Ok((inner.run_seq > 0).then_some(inner.run_seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::pagination::cursor::Cursor;

    #[tokio::test]
    async fn checkpoints_are_keyed_by_run_and_step() {
        let store = MemoryStateStore::new();
        store
            .put_checkpoint(&Checkpoint::new(1, "import", Cursor::Offset { offset: 5 }, false))
            .await
            .unwrap();
        store
            .put_checkpoint(&Checkpoint::new(2, "import", Cursor::Offset { offset: 9 }, false))
            .await
            .unwrap();

        let cp = store.get_checkpoint(1, "import").await.unwrap().unwrap();
        assert_eq!(cp.cursor.offset(), 5);
        assert_eq!(store.checkpoints(2).await.unwrap().len(), 1);
        assert!(store.get_checkpoint(1, "reconcile").await.unwrap().is_none());
    }
}
