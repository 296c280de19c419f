use crate::http::error::FetchError;
use async_trait::async_trait;
use model::pagination::page::PageEnvelope;
use serde::de::DeserializeOwned;
use std::{marker::PhantomData, time::Duration};
use tracing::debug;

/// Retrieves one page of a paginated feed.
///
/// `Ok(None)` means the endpoint answered without a body.
#[async_trait]
pub trait PageFetcher<T>: Send + Sync {
    async fn fetch_page(&self, page: u64, size: u32) -> Result<Option<PageEnvelope<T>>, FetchError>;

    /// Human readable location used in logs.
    fn endpoint(&self) -> String;
}

/// Fetches `GET <base_url>?page=<n>&size=<m>` and decodes the JSON envelope.
pub struct HttpPageFetcher<T> {
    client: reqwest::Client,
    base_url: reqwest::Url,
    _item: PhantomData<fn() -> T>,
}

impl<T> HttpPageFetcher<T> {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, FetchError> {
        let base_url =
            reqwest::Url::parse(base_url).map_err(|_| FetchError::InvalidUrl(base_url.into()))?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            _item: PhantomData,
        })
    }

    pub fn page_url(&self, page: u64, size: u32) -> reqwest::Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("size", &size.to_string());
        url
    }
}

#[async_trait]
impl<T> PageFetcher<T> for HttpPageFetcher<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn fetch_page(&self, page: u64, size: u32) -> Result<Option<PageEnvelope<T>>, FetchError> {
        let url = self.page_url(page, size);
        debug!(%url, page, "Fetching page");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|source| FetchError::Request { page, source })?;

        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Request { page, source })?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let envelope = serde_json::from_slice::<Option<PageEnvelope<T>>>(&body)
            .map_err(|source| FetchError::Decode { page, source })?;
        Ok(envelope)
    }

    fn endpoint(&self) -> String {
        self.base_url.to_string()
    }
}
