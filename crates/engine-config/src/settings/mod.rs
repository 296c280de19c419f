use crate::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, str::FromStr, time::Duration};
use tracing::debug;

pub mod env;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_THREADS: usize = 4;
pub const DEFAULT_SKIP_LIMIT: u64 = 100;
pub const DEFAULT_PAGE_SIZE: u32 = 500;
pub const DEFAULT_DB_POOL_SIZE: usize = 4;

/// What the executor does when a chunk's write transaction fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteFailurePolicy {
    /// The step fails.
    #[default]
    Fail,
    /// The chunk is dropped and counted as one skip.
    Skip,
}

impl FromStr for WriteFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(WriteFailurePolicy::Fail),
            "skip" => Ok(WriteFailurePolicy::Skip),
            other => Err(format!("expected 'fail' or 'skip', got '{other}'")),
        }
    }
}

impl fmt::Display for WriteFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteFailurePolicy::Fail => f.write_str("fail"),
            WriteFailurePolicy::Skip => f.write_str("skip"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencySettings {
    pub enabled: bool,
    pub threads: usize,
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threads: DEFAULT_THREADS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    pub base_url: Option<String>,
    pub page_size: u32,
    pub timeout_secs: Option<u64>,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: None,
        }
    }
}

impl RemoteSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Tunables of one job invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    pub chunk_size: usize,
    pub concurrency: ConcurrencySettings,
    pub skip_limit: u64,
    pub write_failure: WriteFailurePolicy,
    pub remote: RemoteSettings,
    /// Runs the reconcile step after the import step.
    pub reconcile: bool,
    pub database_url: Option<String>,
    pub db_pool_size: usize,
    pub state_dir: PathBuf,
    pub skip_log_path: Option<PathBuf>,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: ConcurrencySettings::default(),
            skip_limit: DEFAULT_SKIP_LIMIT,
            write_failure: WriteFailurePolicy::default(),
            remote: RemoteSettings::default(),
            reconcile: true,
            database_url: None,
            db_pool_size: DEFAULT_DB_POOL_SIZE,
            state_dir: default_state_dir(),
            skip_log_path: None,
        }
    }
}

impl JobSettings {
    /// Number of chunk workers; one when concurrency is disabled.
    pub fn workers(&self) -> usize {
        if self.concurrency.enabled {
            self.concurrency.threads
        } else {
            1
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.chunk_size == 0 {
            return Err(SettingsError::Zero("chunk size"));
        }
        if self.concurrency.threads == 0 {
            return Err(SettingsError::Zero("concurrency threads"));
        }
        if self.remote.page_size == 0 {
            return Err(SettingsError::Zero("page size"));
        }
        if self.db_pool_size == 0 {
            return Err(SettingsError::Zero("database pool size"));
        }

        if self.reconcile {
            let url = self
                .remote
                .base_url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .ok_or(SettingsError::Missing("remote base URL"))?;
            check_url("remote base URL", url, &["http", "https"])?;
        }

        if let Some(url) = &self.database_url {
            check_url("database URL", url, &["postgres", "postgresql"])?;
        }

        debug!(?self, "Job settings validated");
        Ok(())
    }
}

fn check_url(key: &'static str, url: &str, schemes: &[&str]) -> Result<(), SettingsError> {
    let parsed = reqwest::Url::parse(url).map_err(|_| SettingsError::InvalidUrl {
        key,
        url: url.to_string(),
    })?;
    if !schemes.contains(&parsed.scheme()) {
        return Err(SettingsError::InvalidUrl {
            key,
            url: url.to_string(),
        });
    }
    Ok(())
}

fn default_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("batchsync"))
        .unwrap_or_else(|| PathBuf::from(".batchsync"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> JobSettings {
        JobSettings {
            remote: RemoteSettings {
                base_url: Some("http://localhost:8080/persons".into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn defaults() {
        let settings = JobSettings::default();
        assert_eq!(settings.chunk_size, 1000);
        assert_eq!(settings.workers(), 4);
        assert_eq!(settings.skip_limit, 100);
        assert_eq!(settings.remote.page_size, 500);
        assert_eq!(settings.write_failure, WriteFailurePolicy::Fail);
    }

    #[test]
    fn disabled_concurrency_uses_one_worker() {
        let mut settings = valid();
        settings.concurrency.enabled = false;
        settings.concurrency.threads = 16;
        assert_eq!(settings.workers(), 1);
    }

    #[test]
    fn rejects_zero_sizes() {
        let mut settings = valid();
        settings.chunk_size = 0;
        assert!(matches!(settings.validate(), Err(SettingsError::Zero(_))));

        let mut settings = valid();
        settings.remote.page_size = 0;
        assert!(matches!(settings.validate(), Err(SettingsError::Zero(_))));
    }

    #[test]
    fn base_url_required_only_for_reconcile() {
        let mut settings = JobSettings::default();
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::Missing("remote base URL"))
        ));

        settings.reconcile = false;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn rejects_wrong_url_schemes() {
        let mut settings = valid();
        settings.remote.base_url = Some("ftp://example.com".into());
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidUrl { .. })
        ));

        let mut settings = valid();
        settings.database_url = Some("mysql://localhost/db".into());
        assert!(settings.validate().is_err());

        settings.database_url = Some("postgres://user:pw@localhost/db".into());
        assert!(settings.validate().is_ok());
    }
}
