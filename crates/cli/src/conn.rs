use crate::error::CliError;
use async_trait::async_trait;
use connectors::{
    http::fetcher::{HttpPageFetcher, PageFetcher},
    sql::postgres::store::PgVersionStore,
};
use model::records::person::RawPerson;
use std::time::Duration;
use tracing::{error, info};

/// Checks that an external dependency answers.
#[async_trait]
pub trait ConnectionPinger {
    fn target(&self) -> &str;

    async fn ping(&self) -> Result<(), CliError>;
}

pub struct PostgresPinger {
    pub url: String,
}

pub struct RemoteFeedPinger {
    pub base_url: String,
}

#[async_trait]
impl ConnectionPinger for PostgresPinger {
    fn target(&self) -> &str {
        "version store"
    }

    async fn ping(&self) -> Result<(), CliError> {
        let store = PgVersionStore::connect(&self.url, 1).await.map_err(|e| {
            error!(error = %e, "PostgreSQL connection failed");
            e
        })?;
        store.ping().await?;
        info!("PostgreSQL answered SELECT 1");
        Ok(())
    }
}

#[async_trait]
impl ConnectionPinger for RemoteFeedPinger {
    fn target(&self) -> &str {
        "remote feed"
    }

    async fn ping(&self) -> Result<(), CliError> {
        let fetcher =
            HttpPageFetcher::<RawPerson>::new(&self.base_url, Some(Duration::from_secs(10)))?;
        let page = fetcher.fetch_page(0, 1).await.map_err(|e| {
            error!(url = %fetcher.page_url(0, 1), error = %e, "Remote feed request failed");
            e
        })?;
        info!(
            total_elements = page.as_ref().map_or(0, |p| p.total_elements),
            "Remote feed answered"
        );
        Ok(())
    }
}
