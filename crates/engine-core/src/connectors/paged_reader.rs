use crate::{
    connectors::source::{ItemReader, SourcePosition},
    error::ReadError,
};
use async_trait::async_trait;
use connectors::http::fetcher::PageFetcher;
use model::{execution::checkpoint::Checkpoint, pagination::cursor::Cursor};
use std::{collections::VecDeque, sync::Arc};
use tracing::{debug, error, info};

/// Page-by-page reader over a remote feed.
///
/// The page cursor only advances once a non-empty page is fully buffered.
/// A checkpoint cannot point inside a page: while buffered items remain,
/// the reported position is the page they came from, so a restart
/// re-fetches and re-delivers that page in full.
pub struct PagedItemReader<T> {
    fetcher: Arc<dyn PageFetcher<T>>,
    page_size: u32,
    page: u64,
    finished: bool,
    failed: bool,
    buffer: VecDeque<T>,
    total_elements: Option<u64>,
    fetches: u64,
}

impl<T> PagedItemReader<T> {
    pub fn new(fetcher: Arc<dyn PageFetcher<T>>, page_size: u32) -> Self {
        Self {
            fetcher,
            page_size,
            page: 0,
            finished: false,
            failed: false,
            buffer: VecDeque::new(),
            total_elements: None,
            fetches: 0,
        }
    }

    /// Number of page requests issued since `open`.
    pub fn fetches(&self) -> u64 {
        self.fetches
    }

    pub fn total_elements(&self) -> Option<u64> {
        self.total_elements
    }

    async fn fetch_next_page(&mut self) -> Result<(), ReadError> {
        self.fetches += 1;
        let response = match self.fetcher.fetch_page(self.page, self.page_size).await {
            Ok(response) => response,
            Err(e) => {
                error!(page = self.page, endpoint = %self.fetcher.endpoint(), error = %e, "Failed to fetch page");
                self.finished = true;
                self.failed = true;
                return Err(e.into());
            }
        };

        let envelope = match response {
            Some(envelope) if !envelope.is_empty() => envelope,
            _ => {
                info!(page = self.page, "No more data available, remote source finished");
                self.finished = true;
                return Ok(());
            }
        };

        if self.total_elements.is_none() {
            self.total_elements = Some(envelope.total_elements);
            info!(
                total_elements = envelope.total_elements,
                total_pages = envelope.total_pages,
                "Starting to read remote feed"
            );
        }

        let content = envelope.into_content();
        let fetched = content.len();
        self.buffer.extend(content);

        info!(
            page = self.page,
            items = fetched,
            progress = self.page * u64::from(self.page_size) + fetched as u64,
            total = self.total_elements.unwrap_or_default(),
            "Fetched page"
        );

        self.page += 1;
        Ok(())
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> ItemReader<T> for PagedItemReader<T> {
    async fn open(&mut self, checkpoint: Option<&Checkpoint>) -> Result<(), ReadError> {
        match checkpoint {
            Some(cp) => {
                self.page = cp.cursor.page();
                self.finished = cp.finished;
                info!(
                    page = self.page,
                    finished = self.finished,
                    endpoint = %self.fetcher.endpoint(),
                    "Resuming remote source"
                );
            }
            None => {
                self.page = 0;
                self.finished = false;
                info!(endpoint = %self.fetcher.endpoint(), "Opened remote source");
            }
        }
        self.failed = false;
        self.buffer.clear();
        self.total_elements = None;
        self.fetches = 0;
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<T>, ReadError> {
        if let Some(item) = self.buffer.pop_front() {
            return Ok(Some(item));
        }
        if self.finished {
            return Ok(None);
        }

        self.fetch_next_page().await?;
        Ok(self.buffer.pop_front())
    }

    fn checkpoint(&self) -> SourcePosition {
        if self.buffer.is_empty() {
            SourcePosition {
                cursor: Cursor::Page { page: self.page },
                finished: self.finished && !self.failed,
            }
        } else {
            SourcePosition {
                cursor: Cursor::Page {
                    page: self.page.saturating_sub(1),
                },
                finished: false,
            }
        }
    }

    async fn close(&mut self) -> Result<(), ReadError> {
        self.buffer.clear();
        debug!(pages = self.page, "Closed remote source");
        Ok(())
    }

    fn name(&self) -> &str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectors::http::error::FetchError;
    use model::pagination::page::PageEnvelope;
    use std::sync::Mutex;

    /// Serves `pages` (index = page number) and records every request.
    struct StubFetcher {
        pages: Vec<Vec<u32>>,
        fail_on: Option<u64>,
        requests: Mutex<Vec<u64>>,
    }

    impl StubFetcher {
        fn new(pages: Vec<Vec<u32>>) -> Self {
            Self {
                pages,
                fail_on: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<u64> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageFetcher<u32> for StubFetcher {
        async fn fetch_page(
            &self,
            page: u64,
            size: u32,
        ) -> Result<Option<PageEnvelope<u32>>, FetchError> {
            self.requests.lock().unwrap().push(page);
            if self.fail_on == Some(page) {
                return Err(FetchError::InvalidUrl("stub failure".into()));
            }
            let content = self.pages.get(page as usize).cloned();
            Ok(Some(PageEnvelope {
                content,
                page,
                size,
                total_elements: self.pages.iter().map(Vec::len).sum::<usize>() as u64,
                total_pages: self.pages.len() as u64,
            }))
        }

        fn endpoint(&self) -> String {
            "stub://persons".into()
        }
    }

    async fn drain(reader: &mut PagedItemReader<u32>) -> Vec<u32> {
        let mut out = Vec::new();
        while let Some(item) = reader.read().await.unwrap() {
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn resumes_at_checkpointed_page() {
        let fetcher = Arc::new(StubFetcher::new(vec![
            vec![1, 2],
            vec![3, 4],
            vec![5, 6],
            vec![7, 8],
        ]));
        let mut reader = PagedItemReader::new(fetcher.clone(), 2);
        let cp = Checkpoint::new(1, "reconcile", Cursor::Page { page: 3 }, false);
        reader.open(Some(&cp)).await.unwrap();

        assert_eq!(drain(&mut reader).await, vec![7, 8]);
        assert_eq!(fetcher.requests(), vec![3, 4]);
    }

    #[tokio::test]
    async fn empty_page_finishes_without_further_fetches() {
        let fetcher = Arc::new(StubFetcher::new(vec![vec![1], vec![]]));
        let mut reader = PagedItemReader::new(fetcher.clone(), 1);
        reader.open(None).await.unwrap();

        assert_eq!(drain(&mut reader).await, vec![1]);
        assert!(reader.read().await.unwrap().is_none());
        assert!(reader.read().await.unwrap().is_none());
        assert_eq!(fetcher.requests(), vec![0, 1]);
        assert_eq!(
            reader.checkpoint(),
            SourcePosition {
                cursor: Cursor::Page { page: 1 },
                finished: true
            }
        );
    }

    #[tokio::test]
    async fn position_points_at_in_flight_page() {
        let fetcher = Arc::new(StubFetcher::new(vec![vec![1, 2, 3], vec![4, 5, 6]]));
        let mut reader = PagedItemReader::new(fetcher, 3);
        reader.open(None).await.unwrap();

        reader.read().await.unwrap();
        assert_eq!(reader.checkpoint().cursor, Cursor::Page { page: 0 });

        reader.read().await.unwrap();
        reader.read().await.unwrap();
        assert_eq!(reader.checkpoint().cursor, Cursor::Page { page: 1 });
        assert!(!reader.checkpoint().finished);
    }

    #[tokio::test]
    async fn fetch_failure_is_fatal_and_does_not_advance() {
        let mut stub = StubFetcher::new(vec![vec![1], vec![2]]);
        stub.fail_on = Some(1);
        let fetcher = Arc::new(stub);
        let mut reader = PagedItemReader::new(fetcher.clone(), 1);
        reader.open(None).await.unwrap();

        assert_eq!(reader.read().await.unwrap(), Some(1));
        let err = reader.read().await.unwrap_err();
        assert!(!err.is_skippable());

        assert!(reader.read().await.unwrap().is_none());
        assert_eq!(
            reader.checkpoint(),
            SourcePosition {
                cursor: Cursor::Page { page: 1 },
                finished: false
            }
        );
        assert_eq!(fetcher.requests(), vec![0, 1]);
    }
}
