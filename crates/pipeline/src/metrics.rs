//! Pipeline counters
//!
//! Atomic counters incremented from the ingress and router hot paths, plus
//! backlog gauges refreshed by the periodic reporter. All operations use
//! relaxed ordering; values are eventually consistent, not real-time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Counters shared by the validator, router and reporter
///
/// Safe to call from any number of tasks concurrently.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Canonical records accepted by validation
    points_received: AtomicU64,

    /// Accepted records that arrived over HTTP
    http_received: AtomicU64,

    /// Accepted records that arrived over RPC
    rpc_received: AtomicU64,

    /// Records dropped because an alert destination queue was full
    alert_dropped: AtomicU64,

    /// Records dropped because at least one store destination queue was full
    store_dropped: AtomicU64,

    /// Records dropped because the tsdb queue was full
    tsdb_dropped: AtomicU64,

    /// Aggregate alert queue depth, sampled by the reporter
    alert_backlog: AtomicU64,

    /// Aggregate store queue depth, sampled by the reporter
    store_backlog: AtomicU64,

    /// Tsdb queue depth, sampled by the reporter
    tsdb_backlog: AtomicU64,
}

impl PipelineMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            points_received: AtomicU64::new(0),
            http_received: AtomicU64::new(0),
            rpc_received: AtomicU64::new(0),
            alert_dropped: AtomicU64::new(0),
            store_dropped: AtomicU64::new(0),
            tsdb_dropped: AtomicU64::new(0),
            alert_backlog: AtomicU64::new(0),
            store_backlog: AtomicU64::new(0),
            tsdb_backlog: AtomicU64::new(0),
        }
    }

    /// Record accepted canonical records
    #[inline]
    pub fn record_received(&self, count: u64) {
        self.points_received.fetch_add(count, Ordering::Relaxed);
    }

    /// Record accepted records that arrived over HTTP
    #[inline]
    pub fn record_http_received(&self, count: u64) {
        self.http_received.fetch_add(count, Ordering::Relaxed);
    }

    /// Record accepted records that arrived over RPC
    #[inline]
    pub fn record_rpc_received(&self, count: u64) {
        self.rpc_received.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a drop on the alert path (queue full)
    #[inline]
    pub fn record_alert_drop(&self) {
        self.alert_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a drop on the store path (one per record, however many of the
    /// node's addresses bounced it)
    #[inline]
    pub fn record_store_drop(&self) {
        self.store_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a drop on the tsdb path (queue full)
    #[inline]
    pub fn record_tsdb_drop(&self) {
        self.tsdb_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Publish the aggregate alert backlog (reporter only)
    #[inline]
    pub fn set_alert_backlog(&self, depth: u64) {
        self.alert_backlog.store(depth, Ordering::Relaxed);
    }

    /// Publish the aggregate store backlog (reporter only)
    #[inline]
    pub fn set_store_backlog(&self, depth: u64) {
        self.store_backlog.store(depth, Ordering::Relaxed);
    }

    /// Publish the tsdb backlog (reporter only)
    #[inline]
    pub fn set_tsdb_backlog(&self, depth: u64) {
        self.tsdb_backlog.store(depth, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            points_received: self.points_received.load(Ordering::Relaxed),
            http_received: self.http_received.load(Ordering::Relaxed),
            rpc_received: self.rpc_received.load(Ordering::Relaxed),
            alert_dropped: self.alert_dropped.load(Ordering::Relaxed),
            store_dropped: self.store_dropped.load(Ordering::Relaxed),
            tsdb_dropped: self.tsdb_dropped.load(Ordering::Relaxed),
            alert_backlog: self.alert_backlog.load(Ordering::Relaxed),
            store_backlog: self.store_backlog.load(Ordering::Relaxed),
            tsdb_backlog: self.tsdb_backlog.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of pipeline counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct PipelineSnapshot {
    /// Accepted canonical records
    pub points_received: u64,
    /// Accepted records over HTTP
    pub http_received: u64,
    /// Accepted records over RPC
    pub rpc_received: u64,
    /// Alert-path drops
    pub alert_dropped: u64,
    /// Store-path drops
    pub store_dropped: u64,
    /// Tsdb-path drops
    pub tsdb_dropped: u64,
    /// Aggregate alert queue depth at last sample
    pub alert_backlog: u64,
    /// Aggregate store queue depth at last sample
    pub store_backlog: u64,
    /// Tsdb queue depth at last sample
    pub tsdb_backlog: u64,
}

// ============================================================================
// DropTracker - rate-limited logging for queue-full drops
// ============================================================================

/// Log interval in milliseconds
const LOG_INTERVAL_MS: u64 = 1000;

/// Aggregates queue-full drops and logs one summary per second instead of
/// one line per dropped record
///
/// Keeps operators aware of sustained backpressure without letting the hot
/// path spam the log.
#[derive(Debug)]
pub struct DropTracker {
    /// Drops in the current interval
    interval_drops: AtomicU64,
    /// Last log time (epoch milliseconds)
    last_log_ms: AtomicU64,
}

impl DropTracker {
    /// Create a new tracker
    pub fn new() -> Self {
        Self {
            interval_drops: AtomicU64::new(0),
            last_log_ms: AtomicU64::new(now_ms()),
        }
    }

    /// Record dropped records and log if the interval has elapsed.
    ///
    /// Returns true if a log line was emitted.
    pub fn record_drop(&self, count: u64) -> bool {
        self.interval_drops.fetch_add(count, Ordering::Relaxed);
        self.maybe_log()
    }

    fn maybe_log(&self) -> bool {
        let now = now_ms();
        let last = self.last_log_ms.load(Ordering::Relaxed);
        if now.saturating_sub(last) < LOG_INTERVAL_MS {
            return false;
        }

        // claim the log slot so concurrent droppers emit one line
        if self
            .last_log_ms
            .compare_exchange(last, now, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }

        let drops = self.interval_drops.swap(0, Ordering::Relaxed);
        if drops == 0 {
            return false;
        }

        tracing::warn!(
            dropped = drops,
            "destination queues full: records dropped in last second"
        );
        true
    }

    /// Drops accumulated in the current interval (for testing)
    #[cfg(test)]
    pub fn current_drops(&self) -> u64 {
        self.interval_drops.load(Ordering::Relaxed)
    }
}

impl Default for DropTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_metrics_start_at_zero() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.snapshot(), PipelineSnapshot::default());
    }

    #[test]
    fn test_received_counters() {
        let metrics = PipelineMetrics::new();
        metrics.record_received(10);
        metrics.record_http_received(7);
        metrics.record_rpc_received(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.points_received, 10);
        assert_eq!(snapshot.http_received, 7);
        assert_eq!(snapshot.rpc_received, 3);
    }

    #[test]
    fn test_drop_counters() {
        let metrics = PipelineMetrics::new();
        metrics.record_alert_drop();
        metrics.record_alert_drop();
        metrics.record_store_drop();
        metrics.record_tsdb_drop();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.alert_dropped, 2);
        assert_eq!(snapshot.store_dropped, 1);
        assert_eq!(snapshot.tsdb_dropped, 1);
    }

    #[test]
    fn test_backlog_gauges_overwrite() {
        let metrics = PipelineMetrics::new();
        metrics.set_alert_backlog(100);
        metrics.set_alert_backlog(42);
        assert_eq!(metrics.snapshot().alert_backlog, 42);
    }

    #[test]
    fn test_concurrent_increments() {
        let metrics = Arc::new(PipelineMetrics::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let metrics = Arc::clone(&metrics);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    metrics.record_received(1);
                    metrics.record_alert_drop();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.points_received, 4000);
        assert_eq!(snapshot.alert_dropped, 4000);
    }

    #[test]
    fn test_drop_tracker_accumulates() {
        let tracker = DropTracker::new();
        tracker.record_drop(3);
        tracker.record_drop(2);
        assert_eq!(tracker.current_drops(), 5);
    }
}
