use crate::{
    error::StateStoreError,
    state::{StateStore, models::ExecutionEvent},
};
use async_trait::async_trait;
use model::execution::checkpoint::Checkpoint;
use std::path::Path;

const RUN_SEQ_KEY: &[u8] = b"run_seq";

pub struct SledStateStore {
    db: sled::Db,
}

impl SledStateStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StateStoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    #[inline]
    fn chk_key(run_id: u64, step: &str) -> String {
        format!("chk:{run_id:020}:{step}")
    }

    #[inline]
    fn chk_prefix(run_id: u64) -> String {
        format!("chk:{run_id:020}:")
    }

    #[inline]
    fn log_prefix(run_id: u64) -> String {
        format!("log:{run_id:020}:")
    }

    fn decode_seq(bytes: &[u8]) -> u64 {
        let mut buf = [0u8; 8];
        let len = bytes.len().min(8);
        buf[8 - len..].copy_from_slice(&bytes[bytes.len() - len..]);
        u64::from_be_bytes(buf)
    }
}

#[async_trait]
impl StateStore for SledStateStore {
    async fn put_checkpoint(&self, cp: &Checkpoint) -> Result<(), StateStoreError> {
        let key = Self::chk_key(cp.run_id, &cp.step);
        let bytes = bincode::serialize(cp)?;
        self.db
            .insert(key, bytes)
            .map_err(|e| StateStoreError::SaveCheckpoint(e.to_string()))?;
        self.db
            .flush_async()
            .await
            .map_err(|e| StateStoreError::SaveCheckpoint(e.to_string()))?;
        Ok(())
    }

    async fn get_checkpoint(
        &self,
        run_id: u64,
        step: &str,
    ) -> Result<Option<Checkpoint>, StateStoreError> {
        let key = Self::chk_key(run_id, step);
        match self
            .db
            .get(key)
            .map_err(|e| StateStoreError::LoadCheckpoint(e.to_string()))?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn checkpoints(&self, run_id: u64) -> Result<Vec<Checkpoint>, StateStoreError> {
        let mut out = Vec::new();
        for item in self.db.scan_prefix(Self::chk_prefix(run_id)) {
            let (_key, value) = item.map_err(|e| StateStoreError::LoadCheckpoint(e.to_string()))?;
            out.push(bincode::deserialize(&value)?);
        }
        Ok(out)
    }

    async fn append_event(&self, event: &ExecutionEvent) -> Result<(), StateStoreError> {
        // generate_id is monotonic across restarts, so key order is append order.
        let seq = self
            .db
            .generate_id()
            .map_err(|e| StateStoreError::AppendEvent(e.to_string()))?;
        let key = format!("{}{seq:020}", Self::log_prefix(event.run_id()));
        let value = bincode::serialize(event)?;

        self.db
            .insert(key, value)
            .map_err(|e| StateStoreError::AppendEvent(e.to_string()))?;
        Ok(())
    }

    async fn events(&self, run_id: u64) -> Result<Vec<ExecutionEvent>, StateStoreError> {
        let mut entries = Vec::new();
        for item in self.db.scan_prefix(Self::log_prefix(run_id)) {
            let (_key, value) = item.map_err(|e| StateStoreError::IterateEvents(e.to_string()))?;
            entries.push(bincode::deserialize(&value)?);
        }
        Ok(entries)
    }

    async fn next_run_id(&self) -> Result<u64, StateStoreError> {
        let updated = self
            .db
            .update_and_fetch(RUN_SEQ_KEY, |old| {
                let next = old.map_or(1, |bytes| Self::decode_seq(bytes) + 1);
                Some(next.to_be_bytes().to_vec())
            })
            .map_err(|e| StateStoreError::RunSequence(e.to_string()))?;

        let run_id = updated
            .map(|bytes| Self::decode_seq(&bytes))
            .ok_or_else(|| StateStoreError::RunSequence("sequence value missing".into()))?;

        self.db
            .flush_async()
            .await
            .map_err(|e| StateStoreError::RunSequence(e.to_string()))?;
        Ok(run_id)
    }

    async fn last_run_id(&self) -> Result<Option<u64>, StateStoreError> {
        let value = self
            .db
            .get(RUN_SEQ_KEY)
            .map_err(|e| StateStoreError::RunSequence(e.to_string()))?;
        Ok(value.map(|bytes| Self::decode_seq(&bytes)))
    }
}
