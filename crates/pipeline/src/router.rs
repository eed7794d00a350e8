//! Router - fan-out of canonical records to the backend families
//!
//! The composition point of the pipeline: for each record the router derives
//! the routing key, resolves the destination node on the family's hash ring,
//! projects the record into the family's wire shape and pushes it onto the
//! destination queue. Families fail independently; a record bounced by one
//! family still reaches the others.

use std::sync::Arc;

use relay_protocol::{AlertRecord, MetricPoint, StoreRecord, TsdbRecord};

use crate::metrics::{DropTracker, PipelineMetrics};
use crate::probe::ProbeSet;
use crate::topology::Topology;

/// Fans canonical records out to every enabled backend family
///
/// # Design
///
/// - The hot path never blocks: every queue push is a non-blocking
///   `try`-style call, and a full queue means the record is dropped and
///   counted, not retried.
/// - Node resolution failures (empty ring) are logged and skipped without a
///   distinguishing counter - same externally visible effect as a
///   queue-full drop.
/// - A storage node may own several addresses; the record is pushed to every
///   address's queue, and any failure within the group counts as one
///   aggregate store drop.
pub struct Router {
    topology: Arc<Topology>,
    probes: Arc<ProbeSet>,
    metrics: Arc<PipelineMetrics>,
    drop_tracker: DropTracker,
}

impl Router {
    /// Create a router over a built topology.
    pub fn new(
        topology: Arc<Topology>,
        probes: Arc<ProbeSet>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            topology,
            probes,
            metrics,
            drop_tracker: DropTracker::new(),
        }
    }

    /// The topology this router fans out over
    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    /// The shared pipeline counters
    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// The trace/filter probes consulted on the storage path
    pub fn probes(&self) -> &Arc<ProbeSet> {
        &self.probes
    }

    /// Fan a batch of canonical records out to every enabled family.
    pub fn route(&self, points: &[MetricPoint]) {
        self.route_store(points);
        self.route_alert(points);
        self.route_tsdb(points);
    }

    /// Alerting path: shard by routing key, align timestamps, queue per node.
    fn route_alert(&self, points: &[MetricPoint]) {
        let Some(family) = self.topology.alert.as_ref() else {
            return;
        };

        for point in points {
            let key = point.routing_key();
            let node = match family.ring.node(&key) {
                Ok(node) => node,
                Err(error) => {
                    tracing::warn!(key = %key, error = %error, "alert node resolution failed, record dropped");
                    continue;
                }
            };

            let Some(queue) = family.queues.get(node) else {
                // ring and queue table are built from the same node set
                tracing::warn!(node = %node, "alert node has no queue, record dropped");
                continue;
            };

            let record = AlertRecord::from_point(point, self.topology.min_step);
            if !queue.push(record) {
                self.metrics.record_alert_drop();
                self.drop_tracker.record_drop(1);
            }
        }
    }

    /// Storage path: probes first, then shard and replicate to every address
    /// of the resolved node.
    fn route_store(&self, points: &[MetricPoint]) {
        let Some(family) = self.topology.store.as_ref() else {
            return;
        };

        for point in points {
            let key = point.routing_key();

            // probes run before any queueing so captures reflect offered
            // traffic, not delivered traffic
            self.probes.observe(&key, point);

            let node = match family.ring.node(&key) {
                Ok(node) => node,
                Err(error) => {
                    tracing::warn!(key = %key, error = %error, "store node resolution failed, record dropped");
                    continue;
                }
            };

            let Some(dests) = family.nodes.get(node) else {
                tracing::warn!(node = %node, "store node has no destinations, record dropped");
                continue;
            };

            let record = StoreRecord::from_point(point, self.topology.min_step);
            let mut failed = 0usize;
            for dest in dests {
                if !dest.queue.push(record.clone()) {
                    failed += 1;
                }
            }

            // one aggregate drop per record, however many addresses bounced
            if failed > 0 {
                self.metrics.record_store_drop();
                self.drop_tracker.record_drop(1);
            }
        }
    }

    /// Time-series path: single shared queue, no sharding, no alignment.
    fn route_tsdb(&self, points: &[MetricPoint]) {
        let Some(family) = self.topology.tsdb.as_ref() else {
            return;
        };

        for point in points {
            let record = TsdbRecord::from_point(point);
            if !family.queue.push(record) {
                self.metrics.record_tsdb_drop();
                self.drop_tracker.record_drop(1);
            }
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("alert", &self.topology.alert.is_some())
            .field("store", &self.topology.store.is_some())
            .field("tsdb", &self.topology.tsdb.is_some())
            .finish()
    }
}
