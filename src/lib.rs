//! Add-on Catalog Proxy Library
//!
//! Fetches the upstream add-on catalog, caches it for a TTL and serves each
//! gateway the builds compatible with its version and architecture.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod fetch;
pub mod filter;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use cache::CatalogCache;
pub use catalog::{decode_catalog, Catalog};
pub use config::schema::ProxyConfig;
pub use fetch::{CatalogSource, FetchError, HttpFetcher};
pub use filter::{filter, RequesterContext};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
