use async_trait::async_trait;
use connectors::sql::base::store::VersionStore;
use engine_core::{connectors::processor::ItemProcessor, error::ProcessError};
use model::records::person::PersonRecord;
use std::sync::Arc;
use tracing::{debug, trace};

/// Passes through remote records that disagree with the store's current row.
///
/// Records whose email has no current row are dropped without being reported.
pub struct DiscrepancyMatcher {
    store: Arc<dyn VersionStore>,
}

impl DiscrepancyMatcher {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ItemProcessor<PersonRecord, PersonRecord> for DiscrepancyMatcher {
    async fn process(&self, item: &PersonRecord) -> Result<Option<PersonRecord>, ProcessError> {
        match self.store.find_current(&item.email).await? {
            None => {
                trace!(email = %item.email, "No local record, dropping");
                Ok(None)
            }
            Some(row) if row.matches(item) => Ok(None),
            Some(row) => {
                debug!(email = %item.email, local_version = row.version, "Discrepancy found");
                Ok(Some(item.clone()))
            }
        }
    }

    fn name(&self) -> &str {
        "discrepancy-matcher"
    }
}
