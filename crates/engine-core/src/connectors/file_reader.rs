use crate::{
    connectors::source::{ItemReader, SourcePosition},
    error::ReadError,
};
use async_trait::async_trait;
use connectors::file::csv::source::CsvPersonSource;
use model::{
    execution::checkpoint::Checkpoint, pagination::cursor::Cursor, records::person::RawPerson,
};
use std::path::PathBuf;
use tracing::info;

/// Buffered reader over a delimited person file.
///
/// The cursor counts data records consumed; on restart that many records
/// are discarded before reading resumes.
pub struct FileItemReader {
    path: PathBuf,
    source: Option<CsvPersonSource>,
    finished: bool,
}

impl FileItemReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            source: None,
            finished: false,
        }
    }
}

#[async_trait]
impl ItemReader<RawPerson> for FileItemReader {
    async fn open(&mut self, checkpoint: Option<&Checkpoint>) -> Result<(), ReadError> {
        let mut source = CsvPersonSource::open(&self.path)?;
        self.finished = false;

        if let Some(cp) = checkpoint {
            if cp.finished {
                self.finished = true;
            } else {
                let offset = cp.cursor.offset();
                let skipped = source.skip_rows(offset)?;
                info!(
                    path = %self.path.display(),
                    offset,
                    skipped,
                    "Resuming file source"
                );
            }
        } else {
            info!(path = %self.path.display(), "Opened file source");
        }

        self.source = Some(source);
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<RawPerson>, ReadError> {
        if self.finished {
            return Ok(None);
        }
        let source = self
            .source
            .as_mut()
            .ok_or_else(|| ReadError::NotOpen(self.path.display().to_string()))?;

        match source.next_person() {
            None => {
                self.finished = true;
                Ok(None)
            }
            Some(Ok(person)) => Ok(Some(person)),
            Some(Err(e)) => Err(e.into()),
        }
    }

    fn checkpoint(&self) -> SourcePosition {
        SourcePosition {
            cursor: Cursor::Offset {
                offset: self.source.as_ref().map_or(0, CsvPersonSource::rows_read),
            },
            finished: self.finished,
        }
    }

    async fn close(&mut self) -> Result<(), ReadError> {
        if let Some(source) = self.source.take() {
            info!(
                path = %self.path.display(),
                rows = source.rows_read(),
                "Closed file source"
            );
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn people_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "firstName,lastName,email,age").unwrap();
        writeln!(file, "Ann,Lee,ann@x.com,20").unwrap();
        writeln!(file, "Bob,Ray,bob@x.com,x").unwrap();
        writeln!(file, "Cy,Day,cy@x.com,40").unwrap();
        file
    }

    #[tokio::test]
    async fn malformed_line_is_skippable_and_reading_continues() {
        let file = people_file();
        let mut reader = FileItemReader::new(file.path());
        reader.open(None).await.unwrap();

        assert!(reader.read().await.unwrap().is_some());
        let err = reader.read().await.unwrap_err();
        assert!(err.is_skippable());
        assert_eq!(
            err.snapshot(),
            Some(serde_json::Value::String("Bob,Ray,bob@x.com,x".into()))
        );
        let cy = reader.read().await.unwrap().unwrap();
        assert_eq!(cy.email.as_deref(), Some("cy@x.com"));
        assert!(reader.read().await.unwrap().is_none());
        assert_eq!(
            reader.checkpoint(),
            SourcePosition {
                cursor: Cursor::Offset { offset: 3 },
                finished: true
            }
        );
    }

    #[tokio::test]
    async fn reopening_from_checkpoint_skips_consumed_records() {
        let file = people_file();
        let mut reader = FileItemReader::new(file.path());
        let cp = Checkpoint::new(1, "import", Cursor::Offset { offset: 2 }, false);
        reader.open(Some(&cp)).await.unwrap();

        let cy = reader.read().await.unwrap().unwrap();
        assert_eq!(cy.first_name.as_deref(), Some("Cy"));
    }

    #[tokio::test]
    async fn finished_checkpoint_yields_nothing() {
        let file = people_file();
        let mut reader = FileItemReader::new(file.path());
        let cp = Checkpoint::new(1, "import", Cursor::Offset { offset: 3 }, true);
        reader.open(Some(&cp)).await.unwrap();
        assert!(reader.read().await.unwrap().is_none());
    }
}
