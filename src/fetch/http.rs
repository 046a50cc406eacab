//! HTTP catalog fetcher.

use std::time::{Duration, Instant};

use url::Url;

use crate::catalog::{decode_catalog, Catalog};
use crate::config::UpstreamConfig;
use crate::fetch::{CatalogSource, FetchError, FetchResult};
use crate::observability::metrics;

/// Fetches the catalog document from a fixed upstream URL.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    url: Url,
}

impl HttpFetcher {
    /// Create a fetcher from the upstream configuration.
    pub fn new(config: &UpstreamConfig) -> Result<Self, FetchError> {
        let url = Url::parse(&config.url)
            .map_err(|e| FetchError::Unreachable(format!("invalid upstream URL: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Unreachable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn fetch_catalog(&self) -> FetchResult<Catalog> {
        let started = Instant::now();
        let result = self.request_document().await;

        match &result {
            Ok(catalog) => {
                tracing::info!(url = %self.url, entries = catalog.len(), "Fetched upstream catalog");
                metrics::record_fetch("ok", started);
            }
            Err(e) => {
                tracing::warn!(url = %self.url, kind = e.kind().as_str(), error = %e, "Upstream fetch failed");
                metrics::record_fetch(e.kind().as_str(), started);
            }
        }
        result
    }

    async fn request_document(&self) -> FetchResult<Catalog> {
        let response = self
            .client
            .get(self.url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Unreachable(format!("upstream returned status {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        decode_catalog(&body).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

impl CatalogSource for HttpFetcher {
    fn fetch(&self) -> impl std::future::Future<Output = FetchResult<Catalog>> + Send {
        self.fetch_catalog()
    }
}
