//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use addon_proxy::cache::CatalogCache;
use addon_proxy::config::ProxyConfig;
use addon_proxy::fetch::HttpFetcher;
use addon_proxy::http::HttpServer;
use addon_proxy::lifecycle::Shutdown;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Catalog with one add-on carrying an arch-specific and an agnostic build.
pub const SCENARIO: &str = r#"[{"id": "a", "name": "A", "builds": [
    {"arch": "linux-arm", "range": ">=0.5.0", "url": "u1"},
    {"arch": "*", "range": ">=0.5.0", "url": "u2"}
]}]"#;

pub const GATEWAY_UA: &str = "webthings-gateway/1.0.0 (linux-arm; linux)";

/// A mock upstream that counts the requests it has served.
pub struct MockUpstream {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl MockUpstream {
    pub fn url(&self) -> String {
        format!("http://{}/addons.json", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start a mock upstream that always returns `body` with status 200.
pub async fn start_mock_upstream(body: &'static str) -> MockUpstream {
    start_programmable_upstream(move |_| async move { (200, body.to_string()) }).await
}

/// Start a mock upstream whose response depends on the request number (0-based).
pub async fn start_programmable_upstream<F, Fut>(f: F) -> MockUpstream
where
    F: Fn(usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let f = Arc::new(f);

    let counter = hits.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    let counter = counter.clone();
                    tokio::spawn(async move {
                        read_request_head(&mut socket).await;
                        let n = counter.fetch_add(1, Ordering::SeqCst);
                        let (status, body) = f(n).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockUpstream { addr, hits }
}

async fn read_request_head(socket: &mut tokio::net::TcpStream) {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 512];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    return;
                }
            }
        }
    }
}

/// A running proxy bound to an ephemeral port.
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub cache: Arc<CatalogCache<HttpFetcher>>,
    shutdown: Shutdown,
}

impl RunningProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn stop(&self) {
        self.shutdown.trigger();
    }
}

/// Start the proxy in front of `upstream_url` with the given TTL.
pub async fn start_proxy(upstream_url: &str, ttl: Duration) -> RunningProxy {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1".into();
    config.listener.port = 0;
    config.upstream.url = upstream_url.to_string();
    config.upstream.timeout_secs = 5;
    config.cache.ttl_secs = ttl.as_secs().max(1);

    let fetcher = HttpFetcher::new(&config.upstream).unwrap();
    let cache = Arc::new(CatalogCache::new(fetcher, ttl));
    let server = HttpServer::new(config, Arc::clone(&cache)).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    RunningProxy {
        addr,
        cache,
        shutdown,
    }
}

/// A client that never reuses connections.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
