use async_trait::async_trait;
use engine_core::{connectors::processor::ItemProcessor, error::ProcessError};
use std::sync::Arc;

/// Runs `first`, then `second` on its output. A rejection by `first`
/// short-circuits the chain.
pub struct ProcessorChain<I, M, O> {
    first: Arc<dyn ItemProcessor<I, M>>,
    second: Arc<dyn ItemProcessor<M, O>>,
}

impl<I, M, O> ProcessorChain<I, M, O>
where
    I: Send + Sync + 'static,
    M: Send + Sync + 'static,
    O: Send + 'static,
{
    pub fn new(first: Arc<dyn ItemProcessor<I, M>>, second: Arc<dyn ItemProcessor<M, O>>) -> Self {
        Self { first, second }
    }
}

#[async_trait]
impl<I, M, O> ItemProcessor<I, O> for ProcessorChain<I, M, O>
where
    I: Send + Sync + 'static,
    M: Send + Sync + 'static,
    O: Send + 'static,
{
    async fn process(&self, item: &I) -> Result<Option<O>, ProcessError> {
        match self.first.process(item).await? {
            Some(mid) => self.second.process(&mid).await,
            None => Ok(None),
        }
    }

    fn name(&self) -> &str {
        "chain"
    }
}
