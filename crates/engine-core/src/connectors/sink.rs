use crate::error::WriteError;
use async_trait::async_trait;

/// Chunk-level writer. A call to `write` either applies the whole chunk or
/// none of it.
#[async_trait]
pub trait ItemWriter<T>: Send + Sync
where
    T: Send + 'static,
{
    /// Prepares the target. `resuming` is set when the step continues from
    /// a checkpoint, so output that survives across runs must be kept.
    async fn open(&self, _resuming: bool) -> Result<(), WriteError> {
        Ok(())
    }

    /// Applies `items` as one unit and returns the number of items written.
    async fn write(&self, items: Vec<T>) -> Result<usize, WriteError>;

    async fn close(&self) -> Result<(), WriteError> {
        Ok(())
    }

    fn name(&self) -> &str;
}
