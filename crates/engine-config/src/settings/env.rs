use super::{JobSettings, WriteFailurePolicy};
use crate::error::SettingsError;
use std::{collections::HashMap, path::PathBuf, str::FromStr};

pub const CHUNK_SIZE: &str = "BATCH_CHUNK_SIZE";
pub const CONCURRENCY_ENABLED: &str = "BATCH_CONCURRENCY_ENABLED";
pub const THREADS: &str = "BATCH_THREADS";
pub const SKIP_LIMIT: &str = "BATCH_SKIP_LIMIT";
pub const WRITE_FAILURE: &str = "BATCH_WRITE_FAILURE";
pub const REMOTE_BASE_URL: &str = "BATCH_REMOTE_BASE_URL";
pub const PAGE_SIZE: &str = "BATCH_PAGE_SIZE";
pub const REMOTE_TIMEOUT_SECS: &str = "BATCH_REMOTE_TIMEOUT_SECS";
pub const RECONCILE: &str = "BATCH_RECONCILE";
pub const DATABASE_URL: &str = "BATCH_DATABASE_URL";
pub const DB_POOL_SIZE: &str = "BATCH_DB_POOL_SIZE";
pub const STATE_DIR: &str = "BATCH_STATE_DIR";
pub const SKIP_LOG: &str = "BATCH_SKIP_LOG";

impl JobSettings {
    /// Builds settings from `BATCH_*` keys, falling back to defaults for
    /// absent keys. Blank values count as absent.
    pub fn from_env(vars: &HashMap<String, String>) -> Result<Self, SettingsError> {
        let mut settings = JobSettings::default();
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        if let Some(v) = get(CHUNK_SIZE) {
            settings.chunk_size = parse(CHUNK_SIZE, v)?;
        }
        if let Some(v) = get(CONCURRENCY_ENABLED) {
            settings.concurrency.enabled = parse_bool(CONCURRENCY_ENABLED, v)?;
        }
        if let Some(v) = get(THREADS) {
            settings.concurrency.threads = parse(THREADS, v)?;
        }
        if let Some(v) = get(SKIP_LIMIT) {
            settings.skip_limit = parse(SKIP_LIMIT, v)?;
        }
        if let Some(v) = get(WRITE_FAILURE) {
            settings.write_failure = WriteFailurePolicy::from_str(v).map_err(|reason| {
                SettingsError::InvalidValue {
                    key: WRITE_FAILURE,
                    value: v.to_string(),
                    reason,
                }
            })?;
        }
        if let Some(v) = get(REMOTE_BASE_URL) {
            settings.remote.base_url = Some(v.to_string());
        }
        if let Some(v) = get(PAGE_SIZE) {
            settings.remote.page_size = parse(PAGE_SIZE, v)?;
        }
        if let Some(v) = get(REMOTE_TIMEOUT_SECS) {
            settings.remote.timeout_secs = Some(parse(REMOTE_TIMEOUT_SECS, v)?);
        }
        if let Some(v) = get(RECONCILE) {
            settings.reconcile = parse_bool(RECONCILE, v)?;
        }
        if let Some(v) = get(DATABASE_URL) {
            settings.database_url = Some(v.to_string());
        }
        if let Some(v) = get(DB_POOL_SIZE) {
            settings.db_pool_size = parse(DB_POOL_SIZE, v)?;
        }
        if let Some(v) = get(STATE_DIR) {
            settings.state_dir = PathBuf::from(v);
        }
        if let Some(v) = get(SKIP_LOG) {
            settings.skip_log_path = Some(PathBuf::from(v));
        }

        Ok(settings)
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, SettingsError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| SettingsError::InvalidValue {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, SettingsError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::InvalidValue {
            key,
            value: value.to_string(),
            reason: "expected a boolean".into(),
        }),
    }
}
