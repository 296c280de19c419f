use async_trait::async_trait;
use engine_core::connectors::listener::SkipListener;
use model::execution::skip::{SkipPhase, SkipRecord};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};
use tracing::{debug, error};

pub const SKIP_TARGET: &str = "skipped_records";

#[derive(Error, Debug)]
pub enum SkipLogError {
    #[error("Failed to write to file: {0}")]
    FileWrite(#[from] std::io::Error),

    #[error("Failed to serialize skip record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable side-channel for skipped items.
///
/// Every skip is logged under the `skipped_records` target; when a path is
/// configured it is also appended to that file as one JSON object per line.
pub struct SkipLog {
    path: Option<PathBuf>,
    file_lock: Mutex<()>,
}

impl SkipLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            file_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn field<'a>(record: &'a SkipRecord, name: &str) -> Option<&'a serde_json::Value> {
        record.item.as_ref().and_then(|item| item.get(name))
    }

    fn log(record: &SkipRecord) {
        let first_name = Self::field(record, "firstName");
        let last_name = Self::field(record, "lastName");
        let email = Self::field(record, "email");
        let age = Self::field(record, "age");

        match record.phase {
            SkipPhase::Read => error!(
                target: SKIP_TARGET,
                run_id = record.run_id,
                step = %record.step,
                raw = ?record.item,
                reason = %record.cause,
                "READ_PHASE_SKIP"
            ),
            SkipPhase::Process => error!(
                target: SKIP_TARGET,
                run_id = record.run_id,
                step = %record.step,
                first_name = ?first_name,
                last_name = ?last_name,
                email = ?email,
                age = ?age,
                reason = %record.cause,
                "PROCESS_PHASE_SKIP"
            ),
            SkipPhase::Write => error!(
                target: SKIP_TARGET,
                run_id = record.run_id,
                step = %record.step,
                first_name = ?first_name,
                last_name = ?last_name,
                email = ?email,
                age = ?age,
                reason = %record.cause,
                "WRITE_PHASE_SKIP"
            ),
        }
    }

    async fn append(&self, path: &Path, record: &SkipRecord) -> Result<(), SkipLogError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.file_lock.lock().await;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(id = %record.id, path = %path.display(), "Wrote skip record");
        Ok(())
    }
}

#[async_trait]
impl SkipListener for SkipLog {
    async fn on_skip(&self, record: &SkipRecord) {
        Self::log(record);

        if let Some(path) = &self.path {
            if let Err(e) = self.append(path, record).await {
                error!(path = %path.display(), error = %e, "Failed to persist skip record");
            }
        }
    }
}
