use model::execution::params::ParameterError;
use thiserror::Error;

/// Invalid job configuration. Raised before any step runs.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid URL for {key}: {url}")]
    InvalidUrl { key: &'static str, url: String },

    #[error("Invalid job parameters: {0}")]
    Parameters(#[from] ParameterError),
}
