use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Malformed record at line {line}: {reason}")]
    Malformed {
        line: u64,
        raw: String,
        reason: String,
    },
}

impl FileError {
    /// Whether the error concerns a single record and reading may continue.
    pub fn is_record_level(&self) -> bool {
        match self {
            FileError::Malformed { .. } => true,
            FileError::CsvError(e) => !e.is_io_error(),
            _ => false,
        }
    }
}
