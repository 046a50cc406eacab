//! Add-on catalog proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                 ADDON PROXY                   │
//!   Gateway request       │  ┌──────────┐   ┌────────────┐   ┌─────────┐ │
//!   ──────────────────────┼─▶│   http   │──▶│   cache    │──▶│  fetch  │─┼──▶ Upstream
//!   User-Agent: gw/1.0.0  │  │ handlers │   │ TTL + one  │   │  HTTP   │ │    catalog
//!                         │  └────┬─────┘   │ in flight  │   └─────────┘ │    (JSON)
//!                         │       │         └────────────┘               │
//!                         │       ▼                                      │
//!   Filtered JSON         │  ┌──────────┐   ┌────────────┐               │
//!   ◀─────────────────────┼──│ response │◀──│   filter   │               │
//!   (gzip, CORS)          │  └──────────┘   └────────────┘               │
//!                         └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use addon_proxy::config::{load_config, validate_config, ConfigError, ProxyConfig};
use addon_proxy::lifecycle::{self, Shutdown};
use addon_proxy::observability::logging;

#[derive(Debug, Parser)]
#[command(name = "addon-proxy")]
#[command(about = "Caching, compatibility-filtering proxy for the add-on catalog", long_about = None)]
struct Cli {
    /// Port to listen on.
    #[arg(short, long)]
    port: Option<u16>,

    /// Optional TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// URL of the upstream catalog document.
    #[arg(long)]
    upstream_url: Option<String>,

    /// Seconds a fetched catalog stays fresh.
    #[arg(long)]
    ttl_secs: Option<u64>,
}

impl Cli {
    fn into_config(self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(url) = self.upstream_url {
            config.upstream.url = url;
        }
        if let Some(ttl) = self.ttl_secs {
            config.cache.ttl_secs = ttl;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "addon-proxy starting");

    let started = lifecycle::start(config).await?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();
    started
        .server
        .run(started.listener, shutdown.subscribe())
        .await?;

    tracing::info!(
        cache_failures = started.cache.failure_count(),
        "Shutdown complete"
    );
    Ok(())
}
