//! Periodic reporter
//!
//! Samples aggregate queue depth on a fast cadence and dumps connection-pool
//! diagnostics on a slow one. Strictly read-only: it publishes gauges and
//! log lines, it never touches pipeline state.

use std::sync::Arc;
use std::time::Duration;

use relay_pool::ProcSource;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::metrics::PipelineMetrics;
use crate::topology::Topology;

/// Periodic queue-depth and pool-health sampler
pub struct Reporter {
    topology: Arc<Topology>,
    metrics: Arc<PipelineMetrics>,
    pools: Vec<(&'static str, Arc<dyn ProcSource>)>,
    backlog_interval: Duration,
    pool_log_interval: Duration,
}

impl Reporter {
    /// Create a reporter over the topology and counters.
    pub fn new(
        topology: Arc<Topology>,
        metrics: Arc<PipelineMetrics>,
        backlog_interval: Duration,
        pool_log_interval: Duration,
    ) -> Self {
        Self {
            topology,
            metrics,
            pools: Vec::new(),
            backlog_interval,
            pool_log_interval,
        }
    }

    /// Register a pool registry for the slow diagnostic dump.
    pub fn with_pools(mut self, family: &'static str, pools: Arc<dyn ProcSource>) -> Self {
        self.pools.push((family, pools));
        self
    }

    /// Refresh the backlog gauges once.
    pub fn refresh_backlogs(&self) {
        let alert = self.topology.alert_backlog() as u64;
        let store = self.topology.store_backlog() as u64;
        let tsdb = self.topology.tsdb_backlog() as u64;
        self.metrics.set_alert_backlog(alert);
        self.metrics.set_store_backlog(store);
        self.metrics.set_tsdb_backlog(tsdb);
        debug!(alert, store, tsdb, "queue backlog");
    }

    /// Log one diagnostic line per pool, per registered family.
    pub fn log_pools(&self) {
        for (family, pools) in &self.pools {
            let lines = pools.proc();
            info!(family, pools = lines.len(), "connection pools:\n{}", lines.join("\n"));
        }
    }

    /// Run until cancelled. Spawn this as a tokio task.
    pub async fn run(self, cancel: CancellationToken) {
        let mut backlog_tick = tokio::time::interval(self.backlog_interval);
        backlog_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut pool_tick = tokio::time::interval(self.pool_log_interval);
        pool_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // both intervals fire immediately once; swallow that so the first
        // report reflects real uptime
        backlog_tick.tick().await;
        pool_tick.tick().await;

        info!(
            backlog_interval_secs = self.backlog_interval.as_secs(),
            pool_log_interval_secs = self.pool_log_interval.as_secs(),
            "reporter starting"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = backlog_tick.tick() => self.refresh_backlogs(),
                _ = pool_tick.tick() => self.log_pools(),
            }
        }

        info!("reporter stopping");
    }
}
