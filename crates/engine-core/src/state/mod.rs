use crate::{error::StateStoreError, state::models::ExecutionEvent};
use async_trait::async_trait;
use model::execution::checkpoint::Checkpoint;

pub mod memory;
pub mod models;
pub mod sled_store;

/// Durable job bookkeeping: per-step checkpoints, an append-only execution
/// log and the run id sequence.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Overwrites the checkpoint stored for `(cp.run_id, cp.step)`.
    async fn put_checkpoint(&self, cp: &Checkpoint) -> Result<(), StateStoreError>;

    async fn get_checkpoint(
        &self,
        run_id: u64,
        step: &str,
    ) -> Result<Option<Checkpoint>, StateStoreError>;

    /// Every checkpoint recorded for `run_id`, ordered by step name.
    async fn checkpoints(&self, run_id: u64) -> Result<Vec<Checkpoint>, StateStoreError>;

    async fn append_event(&self, event: &ExecutionEvent) -> Result<(), StateStoreError>;

    /// Events of `run_id` in append order.
    async fn events(&self, run_id: u64) -> Result<Vec<ExecutionEvent>, StateStoreError>;

    /// Allocates a run id greater than every id handed out before.
    async fn next_run_id(&self) -> Result<u64, StateStoreError>;

    /// Most recently allocated run id, if any.
    async fn last_run_id(&self) -> Result<Option<u64>, StateStoreError>;
}
