use crate::sql::{
    base::{
        error::StoreError,
        store::{StoreTransaction, VersionStore},
    },
    postgres::utils::{connect_client, versioned_row},
};
use async_trait::async_trait;
use model::records::{person::PersonRecord, versioned::VersionedRow};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_postgres::Client;
use tracing::{debug, info, warn};

const SCHEMA_SQL: &str = include_str!("sql/schema.sql");
const FIND_CURRENT_SQL: &str = include_str!("sql/find_current.sql");
const MARK_NOT_CURRENT_SQL: &str = include_str!("sql/mark_not_current.sql");
const INSERT_VERSION_SQL: &str = include_str!("sql/insert_version.sql");
const LOCK_EMAIL_SQL: &str = include_str!("sql/lock_email.sql");

struct PgSession {
    client: Client,
    /// A transaction was begun and neither committed nor rolled back.
    open_tx: bool,
}

/// PostgreSQL-backed store with one connection per concurrent writer.
///
/// Transactions on the same email are serialized by a transaction-scoped
/// advisory lock; the partial unique index on `(email) WHERE is_current`
/// rejects anything that slips past it.
#[derive(Clone)]
pub struct PgVersionStore {
    sessions: Arc<Vec<Arc<Mutex<PgSession>>>>,
    next: Arc<AtomicUsize>,
}

impl PgVersionStore {
    pub async fn connect(url: &str, pool_size: usize) -> Result<Self, StoreError> {
        let pool_size = pool_size.max(1);
        let mut sessions = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let client = connect_client(url).await?;
            sessions.push(Arc::new(Mutex::new(PgSession {
                client,
                open_tx: false,
            })));
        }

        info!(connections = pool_size, "Connected to PostgreSQL store");
        Ok(Self {
            sessions: Arc::new(sessions),
            next: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Creates the `persons` table and its indexes when missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let session = self.acquire().await?;
        session.client.batch_execute(SCHEMA_SQL).await?;
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let session = self.acquire().await?;
        session.client.simple_query("SELECT 1").await?;
        Ok(())
    }

    /// Takes an idle connection if there is one, otherwise waits for the
    /// next one in rotation.
    async fn acquire(&self) -> Result<OwnedMutexGuard<PgSession>, StoreError> {
        let mut session = self.idle_or_next().await;
        if session.open_tx {
            warn!("Rolling back transaction abandoned on this connection");
            session.client.batch_execute("ROLLBACK").await?;
            session.open_tx = false;
        }
        Ok(session)
    }

    async fn idle_or_next(&self) -> OwnedMutexGuard<PgSession> {
        for session in self.sessions.iter() {
            if let Ok(guard) = session.clone().try_lock_owned() {
                return guard;
            }
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        self.sessions[idx].clone().lock_owned().await
    }
}

#[async_trait]
impl VersionStore for PgVersionStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let mut session = self.acquire().await?;
        session
            .client
            .batch_execute("BEGIN ISOLATION LEVEL READ COMMITTED")
            .await?;
        session.open_tx = true;

        Ok(Box::new(PgTransaction { session }))
    }

    async fn find_current(&self, email: &str) -> Result<Option<VersionedRow>, StoreError> {
        let session = self.acquire().await?;
        let row = session.client.query_opt(FIND_CURRENT_SQL, &[&email]).await?;
        row.as_ref().map(versioned_row).transpose()
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

pub struct PgTransaction {
    session: OwnedMutexGuard<PgSession>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn lock_key(&mut self, email: &str) -> Result<(), StoreError> {
        self.session.client.execute(LOCK_EMAIL_SQL, &[&email]).await?;
        Ok(())
    }

    async fn find_current(&mut self, email: &str) -> Result<Option<VersionedRow>, StoreError> {
        let row = self
            .session
            .client
            .query_opt(FIND_CURRENT_SQL, &[&email])
            .await?;
        row.as_ref().map(versioned_row).transpose()
    }

    async fn mark_not_current(&mut self, email: &str) -> Result<u64, StoreError> {
        let updated = self
            .session
            .client
            .execute(MARK_NOT_CURRENT_SQL, &[&email])
            .await?;
        Ok(updated)
    }

    async fn insert(&mut self, record: &PersonRecord, version: i32) -> Result<i64, StoreError> {
        let row = self
            .session
            .client
            .query_one(
                INSERT_VERSION_SQL,
                &[
                    &record.first_name,
                    &record.last_name,
                    &record.email,
                    &record.age,
                    &version,
                ],
            )
            .await?;
        Ok(row.try_get(0)?)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut session = self.session;
        session.client.batch_execute("COMMIT").await?;
        session.open_tx = false;
        debug!("Transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let mut session = self.session;
        session.client.batch_execute("ROLLBACK").await?;
        session.open_tx = false;
        Ok(())
    }
}
