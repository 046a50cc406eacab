//! Upstream catalog retrieval.
//!
//! # Responsibilities
//! - One outbound GET of the configured catalog URL per call
//! - Classify failures as unreachable (network) or malformed (document)
//!
//! # Design Decisions
//! - No retries here; refresh scheduling belongs to the cache
//! - Sources are pluggable so the cache can be driven by closures in tests

pub mod http;

use std::future::Future;

use thiserror::Error;

use crate::catalog::Catalog;

pub use self::http::HttpFetcher;

/// Errors produced by a catalog fetch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Connection failure, timeout or non-success status.
    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    /// The upstream answered with a document of the wrong shape.
    #[error("upstream document malformed: {0}")]
    Malformed(String),
}

/// Coarse classification of a [`FetchError`], used for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Unreachable,
    Malformed,
}

impl FetchErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchErrorKind::Unreachable => "unreachable",
            FetchErrorKind::Malformed => "malformed",
        }
    }
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Unreachable(_) => FetchErrorKind::Unreachable,
            FetchError::Malformed(_) => FetchErrorKind::Malformed,
        }
    }
}

/// Result type for catalog fetches.
pub type FetchResult<T> = Result<T, FetchError>;

/// Anything able to produce a fresh catalog.
pub trait CatalogSource: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = FetchResult<Catalog>> + Send;
}

impl<F, Fut> CatalogSource for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FetchResult<Catalog>> + Send,
{
    fn fetch(&self) -> impl Future<Output = FetchResult<Catalog>> + Send {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_and_display() {
        let err = FetchError::Unreachable("connection refused".into());
        assert_eq!(err.kind(), FetchErrorKind::Unreachable);
        assert_eq!(err.to_string(), "upstream unreachable: connection refused");

        let err = FetchError::Malformed("document is not a list of add-ons".into());
        assert_eq!(err.kind().as_str(), "malformed");
    }

    #[tokio::test]
    async fn test_closure_source() {
        let source = || async { Ok(Catalog::default()) };
        let catalog = source.fetch().await.unwrap();
        assert!(catalog.is_empty());
    }
}
