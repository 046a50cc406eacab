//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, CORS, compression)
//! - Own the injected catalog cache and request log
//! - Bind server to listener and stop on the shutdown signal

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::cache::CatalogCache;
use crate::config::ProxyConfig;
use crate::fetch::CatalogSource;
use crate::http::handlers;
use crate::http::request::MakeRequestUuidV4;
use crate::observability::RequestLog;

/// Application state injected into handlers.
pub struct AppState<S> {
    pub cache: Arc<CatalogCache<S>>,
    pub requests: Arc<RequestLog>,
    /// Client for fetching license texts.
    pub http: reqwest::Client,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            requests: Arc::clone(&self.requests),
            http: self.http.clone(),
        }
    }
}

impl<S: CatalogSource> AppState<S> {
    /// Build handler state around an already constructed cache.
    pub fn new(config: &ProxyConfig, cache: Arc<CatalogCache<S>>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream.timeout_secs))
            .user_agent(config.upstream.user_agent.clone())
            .build()?;

        Ok(Self {
            cache,
            requests: Arc::new(RequestLog::new(Duration::from_secs(config.analytics.window_secs))),
            http,
        })
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router<S: CatalogSource>(config: &ProxyConfig, state: AppState<S>) -> Router {
    Router::new()
        .route("/addons", get(handlers::list_addons::<S>))
        .route("/addons/license/{addon_id}", get(handlers::get_license::<S>))
        .route("/addons/analytics", get(handlers::analytics::<S>))
        .route("/addons/info", get(handlers::info::<S>))
        .with_state(state)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
}

/// HTTP server for the add-on proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server serving from the given cache.
    ///
    /// Fails when the client used for license fetches cannot be built.
    pub fn new<S: CatalogSource>(
        config: ProxyConfig,
        cache: Arc<CatalogCache<S>>,
    ) -> Result<Self, reqwest::Error> {
        let state = AppState::new(&config, cache)?;
        let router = build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            ttl_secs = self.config.cache.ttl_secs,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}
