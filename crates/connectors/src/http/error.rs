use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid base URL '{0}'")]
    InvalidUrl(String),

    #[error("Request for page {page} failed: {source}")]
    Request {
        page: u64,
        #[source]
        source: reqwest::Error,
    },

    #[error("Page {page} could not be decoded: {source}")]
    Decode {
        page: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("HTTP client could not be built: {0}")]
    Client(#[from] reqwest::Error),
}
