//! Trace and filter probes
//!
//! Debugging hooks consulted on the storage path, before queueing: the trace
//! probe captures recent records whose routing key matches a configured
//! needle, the filter probe captures records whose value crosses a bound.
//! Both are configured and inspected live through the debug HTTP endpoints;
//! an unconfigured probe is a cheap no-op.

use std::collections::VecDeque;

use parking_lot::{Mutex, RwLock};
use relay_protocol::MetricPoint;
use serde::{Deserialize, Serialize};

/// Captured records retained per probe
const PROBE_CAP: usize = 16;

/// Comparison applied by the filter probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    /// Capture values strictly above the bound
    Above,
    /// Capture values strictly below the bound
    Below,
}

/// Filter probe configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Routing-key substring the record must match
    pub key: String,
    /// Comparison direction
    pub op: FilterOp,
    /// Value bound
    pub bound: f64,
}

impl FilterSpec {
    fn matches(&self, key: &str, value: f64) -> bool {
        if !key.contains(self.key.as_str()) {
            return false;
        }
        match self.op {
            FilterOp::Above => value > self.bound,
            FilterOp::Below => value < self.bound,
        }
    }
}

#[derive(Debug, Default)]
struct TraceProbe {
    needle: RwLock<Option<String>>,
    hits: Mutex<VecDeque<MetricPoint>>,
}

#[derive(Debug, Default)]
struct FilterProbe {
    spec: RwLock<Option<FilterSpec>>,
    hits: Mutex<VecDeque<MetricPoint>>,
}

/// The trace and filter probes as one unit
///
/// `observe` is called once per record on the storage path; configuration
/// and inspection happen from the debug endpoints. Reconfiguring a probe
/// clears its captures.
#[derive(Debug, Default)]
pub struct ProbeSet {
    trace: TraceProbe,
    filter: FilterProbe,
}

impl ProbeSet {
    /// Create an empty probe set (both probes unconfigured)
    pub fn new() -> Self {
        Self::default()
    }

    /// Consult both probes for one record.
    pub fn observe(&self, key: &str, point: &MetricPoint) {
        self.observe_trace(key, point);
        self.observe_filter(key, point);
    }

    fn observe_trace(&self, key: &str, point: &MetricPoint) {
        let needle = self.trace.needle.read();
        let Some(needle) = needle.as_deref() else {
            return;
        };
        if !key.contains(needle) {
            return;
        }
        push_capped(&mut self.trace.hits.lock(), point.clone());
    }

    fn observe_filter(&self, key: &str, point: &MetricPoint) {
        let spec = self.filter.spec.read();
        let Some(spec) = spec.as_ref() else {
            return;
        };
        if !spec.matches(key, point.value) {
            return;
        }
        push_capped(&mut self.filter.hits.lock(), point.clone());
    }

    /// Set or clear the trace needle; clears previous captures.
    pub fn set_trace(&self, needle: Option<String>) {
        *self.trace.needle.write() = needle;
        self.trace.hits.lock().clear();
    }

    /// Current trace needle
    pub fn trace_needle(&self) -> Option<String> {
        self.trace.needle.read().clone()
    }

    /// Records captured by the trace probe, oldest first
    pub fn trace_hits(&self) -> Vec<MetricPoint> {
        self.trace.hits.lock().iter().cloned().collect()
    }

    /// Set or clear the filter spec; clears previous captures.
    pub fn set_filter(&self, spec: Option<FilterSpec>) {
        *self.filter.spec.write() = spec;
        self.filter.hits.lock().clear();
    }

    /// Current filter spec
    pub fn filter_spec(&self) -> Option<FilterSpec> {
        self.filter.spec.read().clone()
    }

    /// Records captured by the filter probe, oldest first
    pub fn filter_hits(&self) -> Vec<MetricPoint> {
        self.filter.hits.lock().iter().cloned().collect()
    }
}

fn push_capped(hits: &mut VecDeque<MetricPoint>, point: MetricPoint) {
    if hits.len() >= PROBE_CAP {
        hits.pop_front();
    }
    hits.push_back(point);
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use relay_protocol::CounterKind;

    use super::*;

    fn point(metric: &str, value: f64) -> MetricPoint {
        MetricPoint {
            metric: metric.to_string(),
            endpoint: "host1".to_string(),
            timestamp: 1_700_000_000,
            step: 60,
            kind: CounterKind::Gauge,
            tags: BTreeMap::new(),
            value,
        }
    }

    #[test]
    fn test_unconfigured_probes_capture_nothing() {
        let probes = ProbeSet::new();
        let p = point("cpu.idle", 1.0);
        probes.observe(&p.routing_key(), &p);
        assert!(probes.trace_hits().is_empty());
        assert!(probes.filter_hits().is_empty());
    }

    #[test]
    fn test_trace_captures_matching_keys() {
        let probes = ProbeSet::new();
        probes.set_trace(Some("cpu.idle".to_string()));

        let hit = point("cpu.idle", 1.0);
        let miss = point("mem.used", 2.0);
        probes.observe(&hit.routing_key(), &hit);
        probes.observe(&miss.routing_key(), &miss);

        let hits = probes.trace_hits();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metric, "cpu.idle");
    }

    #[test]
    fn test_filter_bound_directions() {
        let probes = ProbeSet::new();
        probes.set_filter(Some(FilterSpec {
            key: "cpu".to_string(),
            op: FilterOp::Above,
            bound: 90.0,
        }));

        let low = point("cpu.busy", 10.0);
        let high = point("cpu.busy", 99.0);
        probes.observe(&low.routing_key(), &low);
        probes.observe(&high.routing_key(), &high);
        assert_eq!(probes.filter_hits().len(), 1);

        probes.set_filter(Some(FilterSpec {
            key: "cpu".to_string(),
            op: FilterOp::Below,
            bound: 90.0,
        }));
        probes.observe(&low.routing_key(), &low);
        probes.observe(&high.routing_key(), &high);
        let hits = probes.filter_hits();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value, 10.0);
    }

    #[test]
    fn test_reconfigure_clears_captures() {
        let probes = ProbeSet::new();
        probes.set_trace(Some("cpu".to_string()));
        let p = point("cpu.idle", 1.0);
        probes.observe(&p.routing_key(), &p);
        assert_eq!(probes.trace_hits().len(), 1);

        probes.set_trace(Some("mem".to_string()));
        assert!(probes.trace_hits().is_empty());
        assert_eq!(probes.trace_needle(), Some("mem".to_string()));
    }

    #[test]
    fn test_capture_ring_is_capped() {
        let probes = ProbeSet::new();
        probes.set_trace(Some("cpu".to_string()));
        for i in 0..50 {
            let p = point("cpu.idle", i as f64);
            probes.observe(&p.routing_key(), &p);
        }
        let hits = probes.trace_hits();
        assert_eq!(hits.len(), PROBE_CAP);
        // oldest were evicted
        assert_eq!(hits[0].value, (50 - PROBE_CAP) as f64);
    }
}
