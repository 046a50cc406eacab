//! Catalog cache with bounded refresh.
//!
//! # States
//! - Empty: nothing fetched yet; callers wait for the first fetch
//! - Fresh: catalog younger than the TTL; served without any outbound call
//! - Stale: TTL elapsed; the next caller refreshes, everyone else keeps the old copy
//!
//! # State Transitions
//! ```text
//! Empty → Fresh: fetch succeeds
//! Empty → Empty: fetch fails (error returned to the caller)
//! Fresh → Stale: TTL elapses (checked lazily on get, no timer)
//! Stale → Fresh: fetch succeeds (catalog and timestamp replaced)
//! Stale → Stale: fetch fails (old catalog served, timestamp kept, next get retries)
//! ```
//!
//! # Concurrency
//! - The current snapshot lives in an `ArcSwapOption`; reads never block
//! - A `tokio::sync::Mutex` is the single-flight token for refreshes; it guards
//!   fetch initiation only and is never touched on the fresh read path
//! - The token holds the error of the last attempt; callers that waited on an empty
//!   cache and find a newer attempt failed return that error without fetching again
//! - Stale callers that lose the race for the token return the stale catalog at once

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::catalog::Catalog;
use crate::fetch::{CatalogSource, FetchError, FetchResult};
use crate::observability::metrics;

/// Observable cache state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Empty,
    Fresh,
    Stale,
}

impl CacheState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheState::Empty => "empty",
            CacheState::Fresh => "fresh",
            CacheState::Stale => "stale",
        }
    }
}

/// A fetched catalog and when it was fetched.
#[derive(Debug)]
struct Snapshot {
    catalog: Arc<Catalog>,
    fetched_at: Instant,
}

/// TTL cache in front of a [`CatalogSource`].
pub struct CatalogCache<S> {
    source: S,
    ttl: Duration,
    current: ArcSwapOption<Snapshot>,
    /// Single-flight token; holds the error of the last failed attempt.
    refresh: Mutex<Option<FetchError>>,
    /// Completed fetch attempts, bumped while holding `refresh`.
    attempts: AtomicU64,
    failures: AtomicU64,
}

impl<S: CatalogSource> CatalogCache<S> {
    /// Create an empty cache.
    pub fn new(source: S, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            current: ArcSwapOption::empty(),
            refresh: Mutex::new(None),
            attempts: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of failed fetches since startup.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> CacheState {
        match self.current.load().as_deref() {
            None => CacheState::Empty,
            Some(snapshot) if self.is_fresh(snapshot) => CacheState::Fresh,
            Some(_) => CacheState::Stale,
        }
    }

    /// Catalog currently held, regardless of age, without fetching.
    pub fn peek(&self) -> Option<Arc<Catalog>> {
        self.current.load().as_ref().map(|s| Arc::clone(&s.catalog))
    }

    /// Return the cached catalog, fetching or refreshing it when needed.
    pub async fn get(&self) -> FetchResult<Arc<Catalog>> {
        let held = self.current.load_full();
        match held {
            Some(snapshot) if self.is_fresh(&snapshot) => {
                metrics::record_cache_lookup(CacheState::Fresh.as_str());
                Ok(Arc::clone(&snapshot.catalog))
            }
            Some(stale) => {
                metrics::record_cache_lookup(CacheState::Stale.as_str());
                Ok(self.refresh_stale(stale).await)
            }
            None => {
                metrics::record_cache_lookup(CacheState::Empty.as_str());
                self.fill_empty().await
            }
        }
    }

    /// Fetch once at startup so the first request does not pay for it.
    pub async fn warm(&self) -> FetchResult<Arc<Catalog>> {
        let catalog = self.get().await?;
        tracing::info!(entries = catalog.len(), ttl = ?self.ttl, "Catalog cache warmed");
        Ok(catalog)
    }

    async fn refresh_stale(&self, stale: Arc<Snapshot>) -> Arc<Catalog> {
        let Ok(mut last_error) = self.refresh.try_lock() else {
            tracing::debug!("Refresh already in flight, serving stale catalog");
            return Arc::clone(&stale.catalog);
        };

        // Someone may have refreshed between our load and taking the token.
        if let Some(latest) = self.current.load_full() {
            if self.is_fresh(&latest) {
                return Arc::clone(&latest.catalog);
            }
        }

        match self.attempt(&mut last_error).await {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    age = ?stale.fetched_at.elapsed(),
                    "Catalog refresh failed, serving stale catalog"
                );
                Arc::clone(&stale.catalog)
            }
        }
    }

    async fn fill_empty(&self) -> FetchResult<Arc<Catalog>> {
        let seen = self.attempts.load(Ordering::Acquire);
        let mut last_error = self.refresh.lock().await;

        // The fetch we waited on may have filled the cache.
        if let Some(latest) = self.current.load_full() {
            return Ok(Arc::clone(&latest.catalog));
        }
        // Or it failed, and its outcome is ours too.
        if self.attempts.load(Ordering::Acquire) != seen {
            if let Some(e) = last_error.as_ref() {
                tracing::debug!(error = %e, "Sharing failure of the fetch already attempted");
                return Err(e.clone());
            }
        }

        self.attempt(&mut last_error).await.inspect_err(|e| {
            tracing::error!(error = %e, "Initial catalog fetch failed");
        })
    }

    /// Run one fetch while holding the token and record its outcome there.
    async fn attempt(&self, last_error: &mut Option<FetchError>) -> FetchResult<Arc<Catalog>> {
        let result = self.source.fetch().await;
        self.attempts.fetch_add(1, Ordering::Release);
        match result {
            Ok(catalog) => {
                *last_error = None;
                Ok(self.store(catalog))
            }
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                *last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    fn store(&self, catalog: Catalog) -> Arc<Catalog> {
        let catalog = Arc::new(catalog);
        metrics::record_catalog_size(catalog.len());
        self.current.store(Some(Arc::new(Snapshot {
            catalog: Arc::clone(&catalog),
            fetched_at: Instant::now(),
        })));
        tracing::debug!(entries = catalog.len(), "Catalog cache updated");
        catalog
    }

    fn is_fresh(&self, snapshot: &Snapshot) -> bool {
        snapshot.fetched_at.elapsed() < self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;
    use crate::fetch::FetchError;
    use std::sync::atomic::AtomicUsize;

    fn catalog_with(id: &str) -> Catalog {
        Catalog::new(vec![CatalogEntry {
            id: id.to_string(),
            name: id.to_string(),
            description: None,
            author: None,
            homepage_url: None,
            license_url: None,
            primary_type: None,
            builds: vec![],
        }])
    }

    /// Source that answers from a script of results and counts calls.
    fn scripted(
        results: Vec<FetchResult<Catalog>>,
    ) -> (Arc<AtomicUsize>, impl CatalogSource) {
        let calls = Arc::new(AtomicUsize::new(0));
        let script = Arc::new(std::sync::Mutex::new(results.into_iter()));
        let counter = Arc::clone(&calls);
        let source = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            let next = script
                .lock()
                .unwrap()
                .next()
                .unwrap_or_else(|| Err(FetchError::Unreachable("script exhausted".into())));
            async move { next }
        };
        (calls, source)
    }

    fn first_id(catalog: &Catalog) -> &str {
        &catalog.entries()[0].id
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_then_fresh() {
        let (calls, source) = scripted(vec![Ok(catalog_with("one"))]);
        let cache = CatalogCache::new(source, Duration::from_secs(60));
        assert_eq!(cache.state(), CacheState::Empty);

        let catalog = cache.get().await.unwrap();
        assert_eq!(first_id(&catalog), "one");
        assert_eq!(cache.state(), CacheState::Fresh);

        tokio::time::advance(Duration::from_secs(30)).await;
        cache.get().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_failure_propagates() {
        let (calls, source) = scripted(vec![
            Err(FetchError::Malformed("bad".into())),
            Ok(catalog_with("later")),
        ]);
        let cache = CatalogCache::new(source, Duration::from_secs(60));

        let err = cache.get().await.unwrap_err();
        assert_eq!(err, FetchError::Malformed("bad".into()));
        assert_eq!(cache.state(), CacheState::Empty);
        assert_eq!(cache.failure_count(), 1);

        let catalog = cache.get().await.unwrap();
        assert_eq!(first_id(&catalog), "later");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_refreshes() {
        let (calls, source) = scripted(vec![Ok(catalog_with("old")), Ok(catalog_with("new"))]);
        let cache = CatalogCache::new(source, Duration::from_secs(60));
        cache.get().await.unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(cache.state(), CacheState::Stale);

        let catalog = cache.get().await.unwrap();
        assert_eq!(first_id(&catalog), "new");
        assert_eq!(cache.state(), CacheState::Fresh);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_served_on_failure_and_retried() {
        let (calls, source) = scripted(vec![
            Ok(catalog_with("old")),
            Err(FetchError::Unreachable("down".into())),
            Ok(catalog_with("new")),
        ]);
        let cache = CatalogCache::new(source, Duration::from_secs(60));
        cache.get().await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;

        let catalog = cache.get().await.unwrap();
        assert_eq!(first_id(&catalog), "old");
        assert_eq!(cache.failure_count(), 1);
        // The old timestamp is kept, so the very next call tries again.
        assert_eq!(cache.state(), CacheState::Stale);

        let catalog = cache.get().await.unwrap();
        assert_eq!(first_id(&catalog), "new");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    /// Source that takes a second per fetch; the first fetch yields "old".
    fn slow() -> (Arc<AtomicUsize>, impl CatalogSource) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let source = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                FetchResult::<Catalog>::Ok(catalog_with(if n == 0 { "old" } else { "new" }))
            }
        };
        (calls, source)
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_stale_gets_fetch_once() {
        let (calls, source) = slow();
        let cache = Arc::new(CatalogCache::new(source, Duration::from_secs(60)));
        cache.get().await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..10 {
            let cache = Arc::clone(&cache);
            tasks.spawn(async move { cache.get().await });
        }
        let mut stale_served = 0;
        while let Some(result) = tasks.join_next().await {
            let catalog = result.unwrap().unwrap();
            if first_id(&catalog) == "old" {
                stale_served += 1;
            }
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(stale_served, 9);
        assert_eq!(first_id(&cache.peek().unwrap()), "new");
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_empty_gets_wait_for_one_fetch() {
        let (calls, source) = slow();
        let cache = Arc::new(CatalogCache::new(source, Duration::from_secs(60)));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..10 {
            let cache = Arc::clone(&cache);
            tasks.spawn(async move { cache.get().await });
        }
        while let Some(result) = tasks.join_next().await {
            assert_eq!(first_id(&result.unwrap().unwrap()), "old");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_empty_gets_share_one_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let source = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_secs(15)).await;
                FetchResult::<Catalog>::Err(FetchError::Unreachable("timed out".into()))
            }
        };
        let cache = Arc::new(CatalogCache::new(source, Duration::from_secs(60)));
        let started = Instant::now();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..10 {
            let cache = Arc::clone(&cache);
            tasks.spawn(async move { cache.get().await });
        }
        while let Some(result) = tasks.join_next().await {
            let err = result.unwrap().unwrap_err();
            assert_eq!(err, FetchError::Unreachable("timed out".into()));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.failure_count(), 1);
        assert!(started.elapsed() < Duration::from_secs(30));

        // A caller arriving after the failure tries again.
        assert!(cache.get().await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peek_does_not_fetch() {
        let (calls, source) = scripted(vec![Ok(catalog_with("one"))]);
        let cache = CatalogCache::new(source, Duration::from_secs(1));
        assert!(cache.peek().is_none());
        cache.warm().await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(first_id(&cache.peek().unwrap()), "one");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
