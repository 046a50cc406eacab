//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!     → requests.rs (per user agent request log behind /addons/analytics)
//!
//! Consumers:
//!     → stdout (fmt subscriber)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Analytics endpoint (JSON)
//! ```
//!
//! # Design Decisions
//! - Metrics are no-ops until a recorder is installed, so tests need no setup
//! - Request ID flows through the HTTP layer into every request span

pub mod logging;
pub mod metrics;
pub mod requests;

pub use requests::RequestLog;
