use crate::error::JobError;
use connectors::{
    http::fetcher::{HttpPageFetcher, PageFetcher},
    sql::{base::store::VersionStore, memory::MemoryVersionStore, postgres::store::PgVersionStore},
};
use engine_config::settings::JobSettings;
use engine_core::state::{StateStore, sled_store::SledStateStore};
use engine_processing::skip::log::SkipLog;
use model::{
    execution::{params::JobParameters, result::JobResult},
    records::person::RawPerson,
};
use sequencer::JobSequencer;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub mod progress;
pub mod sequencer;
pub mod steps;

/// Runs the import/reconcile job with production collaborators.
pub async fn run(
    settings: JobSettings,
    params: JobParameters,
    cancel: CancellationToken,
) -> Result<JobResult, JobError> {
    settings.validate()?;
    params.validate()?;

    let state = open_state(&settings)?;
    let store = open_version_store(&settings).await?;
    let fetcher = remote_fetcher(&settings)?;

    let skip_log_path = settings
        .skip_log_path
        .clone()
        .unwrap_or_else(|| settings.state_dir.join("skipped.jsonl"));
    info!(path = %skip_log_path.display(), "Skipped items are recorded");
    let listener = Arc::new(SkipLog::new(Some(skip_log_path)));

    let steps = steps::build_steps(&settings, &params, store, fetcher);
    JobSequencer::new(state, listener, cancel)
        .run(steps, &params)
        .await
}

pub fn open_state(settings: &JobSettings) -> Result<Arc<dyn StateStore>, JobError> {
    let path = settings.state_dir.join("state");
    std::fs::create_dir_all(&path)?;
    Ok(Arc::new(SledStateStore::open(&path)?))
}

async fn open_version_store(settings: &JobSettings) -> Result<Arc<dyn VersionStore>, JobError> {
    match &settings.database_url {
        Some(url) => {
            let store = PgVersionStore::connect(url, settings.db_pool_size).await?;
            store.ensure_schema().await?;
            info!(pool = settings.db_pool_size, "Connected to version store");
            Ok(Arc::new(store))
        }
        None => {
            warn!("No database URL configured, versions are kept in memory for this process only");
            Ok(Arc::new(MemoryVersionStore::new()))
        }
    }
}

fn remote_fetcher(
    settings: &JobSettings,
) -> Result<Option<Arc<dyn PageFetcher<RawPerson>>>, JobError> {
    if !settings.reconcile {
        return Ok(None);
    }
    let base_url = settings
        .remote
        .base_url
        .as_deref()
        .ok_or_else(|| JobError::Initialization("remote base URL not set".into()))?;

    let fetcher = HttpPageFetcher::<RawPerson>::new(base_url, settings.remote.timeout())?;
    Ok(Some(Arc::new(fetcher)))
}
