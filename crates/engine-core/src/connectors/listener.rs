use async_trait::async_trait;
use model::execution::skip::SkipRecord;

/// Notified once per skipped item (or per skipped chunk on the write path).
#[async_trait]
pub trait SkipListener: Send + Sync {
    async fn on_skip(&self, record: &SkipRecord);
}

/// Forwards every skip to each listener in order.
pub struct CompositeSkipListener {
    listeners: Vec<Box<dyn SkipListener>>,
}

impl CompositeSkipListener {
    pub fn new(listeners: Vec<Box<dyn SkipListener>>) -> Self {
        Self { listeners }
    }
}

#[async_trait]
impl SkipListener for CompositeSkipListener {
    async fn on_skip(&self, record: &SkipRecord) {
        for listener in &self.listeners {
            listener.on_skip(record).await;
        }
    }
}
