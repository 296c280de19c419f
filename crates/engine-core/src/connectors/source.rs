use crate::error::ReadError;
use async_trait::async_trait;
use model::{execution::checkpoint::Checkpoint, pagination::cursor::Cursor};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Where a source stands, as recorded in a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePosition {
    pub cursor: Cursor,
    pub finished: bool,
}

/// A restartable, forward-only record source.
#[async_trait]
pub trait ItemReader<T>: Send {
    /// Restores the position saved in `checkpoint`, or starts from the beginning.
    async fn open(&mut self, checkpoint: Option<&Checkpoint>) -> Result<(), ReadError>;

    /// Next item, or `None` once the source is exhausted.
    async fn read(&mut self) -> Result<Option<T>, ReadError>;

    /// Position covering every item handed out so far.
    fn checkpoint(&self) -> SourcePosition;

    async fn close(&mut self) -> Result<(), ReadError> {
        Ok(())
    }

    fn name(&self) -> &str;
}

/// Serializes access to a reader that is not safe for concurrent reads.
///
/// Holding the guard lets a caller read a whole chunk and snapshot the
/// position without another read interleaving.
pub struct SynchronizedReader<T> {
    inner: Arc<Mutex<Box<dyn ItemReader<T>>>>,
}

impl<T> Clone for SynchronizedReader<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> SynchronizedReader<T> {
    pub fn new(reader: Box<dyn ItemReader<T>>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(reader)),
        }
    }

    pub async fn lock(&self) -> OwnedMutexGuard<Box<dyn ItemReader<T>>> {
        self.inner.clone().lock_owned().await
    }

    pub async fn open(&self, checkpoint: Option<&Checkpoint>) -> Result<(), ReadError> {
        self.inner.lock().await.open(checkpoint).await
    }

    pub async fn read(&self) -> Result<Option<T>, ReadError> {
        self.inner.lock().await.read().await
    }

    pub async fn checkpoint(&self) -> SourcePosition {
        self.inner.lock().await.checkpoint()
    }

    pub async fn close(&self) -> Result<(), ReadError> {
        self.inner.lock().await.close().await
    }

    pub async fn name(&self) -> String {
        self.inner.lock().await.name().to_string()
    }
}
