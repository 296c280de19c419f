use crate::sql::base::error::StoreError;
use async_trait::async_trait;
use model::records::{person::PersonRecord, versioned::VersionedRow};

/// Row store behind the versioned sink.
///
/// Implementations must serialize transactions that touch the same email.
#[async_trait]
pub trait VersionStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

    /// Reads the current row outside of any chunk transaction.
    async fn find_current(&self, email: &str) -> Result<Option<VersionedRow>, StoreError>;

    fn name(&self) -> &'static str;
}

/// One open transaction. Dropping it without `commit` discards its changes.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Serializes this transaction against others writing the same email.
    async fn lock_key(&mut self, email: &str) -> Result<(), StoreError>;

    async fn find_current(&mut self, email: &str) -> Result<Option<VersionedRow>, StoreError>;

    /// Clears the current flag of every row of `email`; returns rows touched.
    async fn mark_not_current(&mut self, email: &str) -> Result<u64, StoreError>;

    /// Inserts a current row with the given version; returns its id.
    async fn insert(&mut self, record: &PersonRecord, version: i32) -> Result<i64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
