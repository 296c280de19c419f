use crate::sql::base::{
    error::StoreError,
    store::{StoreTransaction, VersionStore},
};
use async_trait::async_trait;
use chrono::Utc;
use model::records::{person::PersonRecord, versioned::VersionedRow};
use std::{collections::HashSet, sync::Arc};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
struct MemoryTable {
    rows: Vec<VersionedRow>,
    next_id: i64,
    failing_emails: HashSet<String>,
}

/// In-process store. A transaction holds the whole table, so transactions
/// are fully serialized; changes are staged and swapped in on commit.
#[derive(Clone, Default)]
pub struct MemoryVersionStore {
    table: Arc<Mutex<MemoryTable>>,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every insert for `email` fail, to exercise commit failures.
    pub async fn fail_inserts_for(&self, email: &str) {
        self.table
            .lock()
            .await
            .failing_emails
            .insert(email.to_string());
    }

    pub async fn clear_failures(&self) {
        self.table.lock().await.failing_emails.clear();
    }

    pub async fn rows(&self) -> Vec<VersionedRow> {
        self.table.lock().await.rows.clone()
    }

    pub async fn rows_for(&self, email: &str) -> Vec<VersionedRow> {
        self.table
            .lock()
            .await
            .rows
            .iter()
            .filter(|r| r.record.email == email)
            .cloned()
            .collect()
    }

    pub async fn current_rows(&self) -> Vec<VersionedRow> {
        self.table
            .lock()
            .await
            .rows
            .iter()
            .filter(|r| r.is_current)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl VersionStore for MemoryVersionStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let table = self.table.clone().lock_owned().await;
        let staged = table.rows.clone();
        let next_id = table.next_id;
        Ok(Box::new(MemoryTransaction {
            table,
            staged,
            next_id,
        }))
    }

    async fn find_current(&self, email: &str) -> Result<Option<VersionedRow>, StoreError> {
        let table = self.table.lock().await;
        Ok(current_of(&table.rows, email).cloned())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

fn current_of<'a>(rows: &'a [VersionedRow], email: &str) -> Option<&'a VersionedRow> {
    rows.iter().find(|r| r.is_current && r.record.email == email)
}

pub struct MemoryTransaction {
    table: OwnedMutexGuard<MemoryTable>,
    staged: Vec<VersionedRow>,
    next_id: i64,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn lock_key(&mut self, _email: &str) -> Result<(), StoreError> {
        // The table guard already excludes every other transaction.
        Ok(())
    }

    async fn find_current(&mut self, email: &str) -> Result<Option<VersionedRow>, StoreError> {
        Ok(current_of(&self.staged, email).cloned())
    }

    async fn mark_not_current(&mut self, email: &str) -> Result<u64, StoreError> {
        let mut touched = 0;
        for row in self
            .staged
            .iter_mut()
            .filter(|r| r.is_current && r.record.email == email)
        {
            row.is_current = false;
            touched += 1;
        }
        Ok(touched)
    }

    async fn insert(&mut self, record: &PersonRecord, version: i32) -> Result<i64, StoreError> {
        if self.table.failing_emails.contains(&record.email) {
            return Err(StoreError::Rejected {
                email: record.email.clone(),
                reason: "insert failure injected".to_string(),
            });
        }
        if current_of(&self.staged, &record.email).is_some() {
            return Err(StoreError::CurrentConflict(record.email.clone()));
        }

        self.next_id += 1;
        self.staged.push(VersionedRow {
            id: self.next_id,
            record: record.clone(),
            version,
            is_current: true,
            updated_at: Utc::now(),
        });
        Ok(self.next_id)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction {
            mut table,
            staged,
            next_id,
        } = *self;
        table.rows = staged;
        table.next_id = next_id;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
