use thiserror::Error;

/// Errors raised by a versioned-row store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Invalid connection URL: {0}")]
    InvalidUrl(String),

    #[error("TLS configuration error: {0}")]
    TlsConfig(#[from] native_tls::Error),

    /// A write would leave two current rows for one email.
    #[error("Current row conflict for '{0}'")]
    CurrentConflict(String),

    /// The store refused the row.
    #[error("Row rejected for '{email}': {reason}")]
    Rejected { email: String, reason: String },
}
