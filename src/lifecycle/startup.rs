//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the upstream fetcher and the catalog cache
//! - Warm the cache so the first client does not wait on upstream
//! - Start the metrics exporter when enabled
//! - Bind the listener last

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::cache::CatalogCache;
use crate::config::ProxyConfig;
use crate::fetch::{FetchError, HttpFetcher};
use crate::http::HttpServer;
use crate::observability::metrics;

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot create upstream fetcher: {0}")]
    Fetcher(#[from] FetchError),

    #[error("cannot create license client: {0}")]
    LicenseClient(#[from] reqwest::Error),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Everything needed to start serving.
pub struct Started {
    pub server: HttpServer,
    pub listener: TcpListener,
    pub cache: Arc<CatalogCache<HttpFetcher>>,
}

/// Initialize subsystems in dependency order.
pub async fn start(config: ProxyConfig) -> Result<Started, StartupError> {
    let fetcher = HttpFetcher::new(&config.upstream)?;
    tracing::info!(url = %fetcher.url(), ttl_secs = config.cache.ttl_secs, "Upstream configured");

    let cache = Arc::new(CatalogCache::new(fetcher, config.cache.ttl()));
    if config.cache.warm_on_startup {
        if let Err(e) = cache.warm().await {
            tracing::warn!(error = %e, "Catalog warm-up failed; first request will retry");
        }
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = HttpServer::new(config.clone(), Arc::clone(&cache))?;

    let address = config.listener.socket_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.clone(),
            source,
        })?;
    tracing::info!(address = %address, "Listening for connections");

    Ok(Started {
        server,
        listener,
        cache,
    })
}
