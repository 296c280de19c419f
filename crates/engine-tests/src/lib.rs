#![allow(dead_code)]

use connectors::{http::fetcher::PageFetcher, sql::base::store::VersionStore};
use engine_config::settings::JobSettings;
use engine_core::state::StateStore;
use engine_processing::skip::log::SkipLog;
use engine_runtime::{
    error::JobError,
    execution::{sequencer::JobSequencer, steps::build_steps},
};
use model::{
    execution::{params::JobParameters, result::JobResult},
    records::person::RawPerson,
};
use std::{path::Path, sync::Arc};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub mod utils;

pub const SOURCE_HEADER: &str = "firstName,lastName,email,age";

/// Files of one job under a scratch directory.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("scratch dir"),
        }
    }

    pub fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    /// Writes `persons.csv` with a header and `lines` as data rows.
    pub fn write_source(&self, lines: &[&str]) -> std::path::PathBuf {
        let path = self.path("persons.csv");
        let mut content = String::from(SOURCE_HEADER);
        for line in lines {
            content.push('\n');
            content.push_str(line);
        }
        content.push('\n');
        std::fs::write(&path, content).expect("write source");
        path
    }

    pub fn params(&self) -> JobParameters {
        JobParameters::new(self.path("persons.csv"), self.path("discrepancies.csv"))
    }

    pub fn settings(&self, chunk_size: usize, threads: usize) -> JobSettings {
        let mut settings = JobSettings::default();
        settings.chunk_size = chunk_size;
        settings.concurrency.enabled = threads > 1;
        settings.concurrency.threads = threads;
        settings.state_dir = self.dir.path().to_path_buf();
        settings.skip_log_path = Some(self.path("skipped.jsonl"));
        settings
    }
}

/// Runs the job with the given collaborators, the way `engine_runtime::run`
/// wires them in production.
pub async fn run_job(
    settings: &JobSettings,
    params: &JobParameters,
    state: Arc<dyn StateStore>,
    store: Arc<dyn VersionStore>,
    feed: Option<Arc<dyn PageFetcher<RawPerson>>>,
) -> Result<JobResult, JobError> {
    let listener = Arc::new(SkipLog::new(settings.skip_log_path.clone()));
    let steps = build_steps(settings, params, store, feed);
    JobSequencer::new(state, listener, CancellationToken::new())
        .run(steps, params)
        .await
}

/// Data lines of a delimited file, header excluded.
pub fn data_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .expect("read file")
        .lines()
        .skip(1)
        .map(str::to_string)
        .collect()
}
