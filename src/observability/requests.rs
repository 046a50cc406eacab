//! Sliding-window request log keyed by user agent.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

/// Key used for requests that carry no `User-Agent`.
pub const UNKNOWN_AGENT: &str = "unknown";

/// Key of the overall count in [`AnalyticsSummary`] JSON.
pub const TOTAL_KEY: &str = "total";

/// Where a user agent literally named [`TOTAL_KEY`] is counted.
pub const TOTAL_AGENT: &str = "total (user agent)";

/// Request counts per user agent within the window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalyticsSummary {
    #[serde(flatten)]
    pub by_agent: BTreeMap<String, usize>,
    pub total: usize,
}

/// Records when each user agent asked for the catalog.
#[derive(Debug)]
pub struct RequestLog {
    window: Duration,
    by_agent: DashMap<String, VecDeque<Instant>>,
    created: Instant,
    /// Milliseconds after `created` at which `record` next drops expired agents.
    next_sweep_ms: AtomicU64,
}

impl RequestLog {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            by_agent: DashMap::new(),
            created: Instant::now(),
            next_sweep_ms: AtomicU64::new(millis(window)),
        }
    }

    pub fn record(&self, user_agent: Option<&str>) {
        let agent = user_agent
            .map(str::trim)
            .filter(|ua| !ua.is_empty())
            .map(|ua| if ua == TOTAL_KEY { TOTAL_AGENT } else { ua })
            .unwrap_or(UNKNOWN_AGENT);
        let now = Instant::now();
        self.sweep_if_due(now);

        let mut times = self.by_agent.entry(agent.to_string()).or_default();
        prune(&mut times, now, self.window);
        times.push_back(now);
    }

    /// Number of user agents currently tracked.
    pub fn agents(&self) -> usize {
        self.by_agent.len()
    }

    /// Drop expired records and count what is left.
    pub fn summary(&self) -> AnalyticsSummary {
        self.sweep(Instant::now());

        let by_agent: BTreeMap<String, usize> = self
            .by_agent
            .iter()
            .map(|r| (r.key().clone(), r.value().len()))
            .collect();
        let total = by_agent.values().sum();
        AnalyticsSummary { by_agent, total }
    }
}

impl RequestLog {
    /// Sweep at most once per window, from whichever caller gets there first.
    fn sweep_if_due(&self, now: Instant) {
        let elapsed = millis(now.duration_since(self.created));
        let due = self.next_sweep_ms.load(Ordering::Relaxed);
        if elapsed < due {
            return;
        }
        let next = elapsed.saturating_add(millis(self.window));
        if self
            .next_sweep_ms
            .compare_exchange(due, next, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            self.sweep(now);
        }
    }

    fn sweep(&self, now: Instant) {
        let before = self.by_agent.len();
        self.by_agent.retain(|_, times| {
            prune(times, now, self.window);
            !times.is_empty()
        });
        let dropped = before.saturating_sub(self.by_agent.len());
        if dropped > 0 {
            tracing::debug!(dropped, remaining = self.by_agent.len(), "Expired user agents dropped");
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn prune(times: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = times.front() {
        if now.duration_since(*oldest) < window {
            break;
        }
        times.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_counts_and_expiry() {
        let log = RequestLog::new(Duration::from_secs(100));
        log.record(Some("webthings-gateway/1.0.0 (linux-arm; linux)"));
        log.record(Some("webthings-gateway/1.0.0 (linux-arm; linux)"));
        log.record(None);

        tokio::time::advance(Duration::from_secs(60)).await;
        log.record(Some("  "));

        let summary = log.summary();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.by_agent[UNKNOWN_AGENT], 2);
        assert_eq!(summary.by_agent["webthings-gateway/1.0.0 (linux-arm; linux)"], 2);

        tokio::time::advance(Duration::from_secs(50)).await;
        let summary = log.summary();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.by_agent.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_agents_dropped_while_recording() {
        let log = RequestLog::new(Duration::from_secs(100));
        for i in 0..500 {
            log.record(Some(format!("agent-{}", i).as_str()));
        }
        assert_eq!(log.agents(), 500);

        tokio::time::advance(Duration::from_secs(101)).await;
        for i in 0..500 {
            log.record(Some(format!("fresh-{}", i).as_str()));
        }

        assert_eq!(log.agents(), 500);
        assert!(log.by_agent.iter().all(|r| r.key().starts_with("fresh-")));
    }

    #[test]
    fn test_agent_named_total_does_not_clash() {
        let log = RequestLog::new(Duration::from_secs(100));
        log.record(Some("total"));
        log.record(Some("gw/1.0.0"));

        let json = serde_json::to_string(&log.summary()).unwrap();
        assert_eq!(json.matches("\"total\":").count(), 1);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[TOTAL_AGENT], 1);
        assert_eq!(value[TOTAL_KEY], 2);
    }

    #[test]
    fn test_summary_json_shape() {
        let mut by_agent = BTreeMap::new();
        by_agent.insert("gw/1.0.0".to_string(), 3);
        let summary = AnalyticsSummary { by_agent, total: 3 };
        assert_eq!(
            serde_json::to_value(&summary).unwrap(),
            serde_json::json!({"gw/1.0.0": 3, "total": 3})
        );
    }
}
