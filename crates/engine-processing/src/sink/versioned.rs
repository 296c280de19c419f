use async_trait::async_trait;
use connectors::sql::base::{
    error::StoreError,
    store::{StoreTransaction, VersionStore},
};
use engine_core::{connectors::sink::ItemWriter, error::WriteError};
use model::records::person::PersonRecord;
use std::sync::Arc;
use tracing::{debug, warn};

/// What applying one record did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Inserted,
    Unchanged,
    Versioned { from: i32, to: i32 },
}

/// Type 2 slowly-changing-dimension writer.
///
/// Each chunk is one store transaction. Records are applied in email order
/// so that concurrent chunks acquire per-email locks in the same order;
/// records sharing an email keep their relative order.
pub struct VersionedSink {
    store: Arc<dyn VersionStore>,
}

impl VersionedSink {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self { store }
    }

    async fn apply(
        tx: &mut dyn StoreTransaction,
        record: &PersonRecord,
    ) -> Result<Applied, StoreError> {
        tx.lock_key(&record.email).await?;

        match tx.find_current(&record.email).await? {
            None => {
                tx.insert(record, 1).await?;
                Ok(Applied::Inserted)
            }
            Some(current) if current.matches(record) => Ok(Applied::Unchanged),
            Some(current) => {
                tx.mark_not_current(&record.email).await?;
                let next = current.version + 1;
                tx.insert(record, next).await?;
                Ok(Applied::Versioned {
                    from: current.version,
                    to: next,
                })
            }
        }
    }
}

#[async_trait]
impl ItemWriter<PersonRecord> for VersionedSink {
    async fn write(&self, mut items: Vec<PersonRecord>) -> Result<usize, WriteError> {
        if items.is_empty() {
            return Ok(0);
        }
        items.sort_by(|a, b| a.email.cmp(&b.email));

        let mut tx = self.store.begin().await?;
        let (mut inserted, mut versioned, mut unchanged) = (0usize, 0usize, 0usize);

        for record in &items {
            let applied = Self::apply(tx.as_mut(), record).await;
            match applied {
                Ok(Applied::Inserted) => inserted += 1,
                Ok(Applied::Unchanged) => unchanged += 1,
                Ok(Applied::Versioned { from, to }) => {
                    debug!(email = %record.email, from, to, "New version");
                    versioned += 1;
                }
                Err(e) => {
                    warn!(email = %record.email, error = %e, "Rolling back chunk");
                    if let Err(rb) = tx.rollback().await {
                        warn!(error = %rb, "Rollback failed");
                    }
                    return Err(e.into());
                }
            }
        }

        tx.commit().await?;
        debug!(
            store = self.store.name(),
            inserted, versioned, unchanged, "Chunk committed"
        );
        Ok(items.len())
    }

    fn name(&self) -> &str {
        "versioned-sink"
    }
}
