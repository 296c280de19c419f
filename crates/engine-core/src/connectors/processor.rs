use crate::error::ProcessError;
use async_trait::async_trait;

/// Per-item transformation.
///
/// `Ok(None)` filters the item out: it is neither written nor counted as a skip.
/// An error is skip-accounted by the caller.
#[async_trait]
pub trait ItemProcessor<I, O>: Send + Sync
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    async fn process(&self, item: &I) -> Result<Option<O>, ProcessError>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
