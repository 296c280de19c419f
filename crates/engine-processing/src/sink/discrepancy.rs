use async_trait::async_trait;
use engine_core::{connectors::sink::ItemWriter, error::WriteError};
use model::records::person::PersonRecord;
use std::path::{Path, PathBuf};
use tokio::{fs::File, io::AsyncWriteExt, sync::Mutex};
use tracing::{debug, info};

pub const REPORT_HEADER: [&str; 4] = ["firstName", "lastName", "email", "age"];

/// Writes discrepant records to a delimited report.
///
/// Opening truncates the report and writes the header. Rows are encoded in
/// memory and appended per chunk.
pub struct DiscrepancySink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl DiscrepancySink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(rows: &[PersonRecord]) -> Result<Vec<u8>, WriteError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        for row in rows {
            writer
                .serialize(row)
                .map_err(|e| WriteError::Serialization(e.to_string()))?;
        }
        writer
            .into_inner()
            .map_err(|e| WriteError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl ItemWriter<PersonRecord> for DiscrepancySink {
    async fn open(&self, _resuming: bool) -> Result<(), WriteError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let header = format!("{}\n", REPORT_HEADER.join(","));
        let mut file = File::create(&self.path).await?;
        file.write_all(header.as_bytes()).await?;
        file.flush().await?;

        info!(path = %self.path.display(), "Created discrepancy report");
        *self.file.lock().await = Some(file);
        Ok(())
    }

    async fn write(&self, items: Vec<PersonRecord>) -> Result<usize, WriteError> {
        let bytes = Self::encode(&items)?;

        let mut guard = self.file.lock().await;
        let file = guard
            .as_mut()
            .ok_or_else(|| WriteError::NotOpen(self.path.display().to_string()))?;
        file.write_all(&bytes).await?;
        file.flush().await?;

        debug!(rows = items.len(), "Appended discrepancies");
        Ok(items.len())
    }

    async fn close(&self) -> Result<(), WriteError> {
        if let Some(mut file) = self.file.lock().await.take() {
            file.flush().await?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "discrepancy-report"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn jane(age: i32) -> PersonRecord {
        PersonRecord::new(Some("Jane".into()), Some("Doe".into()), "jane@x.com", Some(age))
    }

    #[tokio::test]
    async fn fresh_run_truncates_and_writes_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.csv");
        std::fs::write(&path, "stale\n").unwrap();

        let sink = DiscrepancySink::new(&path);
        sink.open(false).await.unwrap();
        sink.write(vec![jane(31)]).await.unwrap();
        sink.close().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "firstName,lastName,email,age\nJane,Doe,jane@x.com,31\n");
    }

    #[tokio::test]
    async fn reopening_starts_a_new_report() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.csv");

        let sink = DiscrepancySink::new(&path);
        sink.open(false).await.unwrap();
        sink.write(vec![jane(31)]).await.unwrap();
        sink.close().await.unwrap();

        let sink = DiscrepancySink::new(&path);
        sink.open(true).await.unwrap();
        sink.write(vec![jane(32)]).await.unwrap();
        sink.write(vec![jane(33)]).await.unwrap();
        sink.close().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "firstName,lastName,email,age\nJane,Doe,jane@x.com,32\nJane,Doe,jane@x.com,33\n"
        );
    }

    #[tokio::test]
    async fn absent_values_are_empty_cells() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("report.csv");

        let sink = DiscrepancySink::new(&path);
        sink.open(false).await.unwrap();
        sink.write(vec![PersonRecord::new(None, None, "x@y.z", None)])
            .await
            .unwrap();
        sink.close().await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with(",,x@y.z,\n"));
    }

    #[tokio::test]
    async fn write_before_open_fails() {
        let sink = DiscrepancySink::new("/nonexistent/report.csv");
        assert!(matches!(
            sink.write(vec![jane(1)]).await,
            Err(WriteError::NotOpen(_))
        ));
    }
}
