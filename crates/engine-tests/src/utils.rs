use async_trait::async_trait;
use connectors::http::{error::FetchError, fetcher::PageFetcher};
use model::{pagination::page::PageEnvelope, records::person::RawPerson};
use std::{
    collections::HashSet,
    sync::atomic::{AtomicU64, Ordering},
};

pub fn raw(first: &str, last: &str, email: &str, age: Option<i32>) -> RawPerson {
    RawPerson {
        first_name: Some(first.to_string()),
        last_name: Some(last.to_string()),
        email: Some(email.to_string()),
        age,
    }
}

/// Serves fixed pages; pages past the end come back empty.
pub struct StubFeed {
    pages: Vec<Vec<RawPerson>>,
    failing: HashSet<u64>,
    requests: AtomicU64,
}

impl StubFeed {
    pub fn new(pages: Vec<Vec<RawPerson>>) -> Self {
        Self {
            pages,
            failing: HashSet::new(),
            requests: AtomicU64::new(0),
        }
    }

    pub fn failing_on(mut self, page: u64) -> Self {
        self.failing.insert(page);
        self
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher<RawPerson> for StubFeed {
    async fn fetch_page(
        &self,
        page: u64,
        size: u32,
    ) -> Result<Option<PageEnvelope<RawPerson>>, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&page) {
            return Err(FetchError::InvalidUrl(format!("stub page {page}")));
        }

        let total_elements = self.pages.iter().map(Vec::len).sum::<usize>() as u64;
        Ok(Some(PageEnvelope {
            content: Some(self.pages.get(page as usize).cloned().unwrap_or_default()),
            page,
            size,
            total_elements,
            total_pages: self.pages.len() as u64,
        }))
    }

    fn endpoint(&self) -> String {
        "stub://persons".to_string()
    }
}
