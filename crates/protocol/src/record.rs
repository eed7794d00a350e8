//! Per-backend wire projections of a canonical record

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::point::{CounterKind, MetricPoint};

/// Floor-align a timestamp to a step boundary.
///
/// Always rounds backward: `align_ts(ts, step) <= ts` and the result is a
/// multiple of `step`. `step` must be positive.
#[inline]
pub fn align_ts(ts: i64, step: i64) -> i64 {
    ts - ts % step
}

/// Record shape delivered to the alerting backend
///
/// Carries the raw value plus enough identity for threshold evaluation; the
/// timestamp is aligned so evaluation windows line up across endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRecord {
    /// Reporting endpoint
    pub endpoint: String,
    /// Metric name
    pub metric: String,
    /// Value as submitted
    pub value: f64,
    /// Timestamp floor-aligned to `max(step, min_step)`
    pub timestamp: i64,
    /// Counter semantics
    pub kind: CounterKind,
    /// Tag pairs
    pub tags: BTreeMap<String, String>,
}

impl AlertRecord {
    /// Project a canonical record, aligning its timestamp to
    /// `max(point.step, min_step)`.
    pub fn from_point(point: &MetricPoint, min_step: i64) -> Self {
        let step = point.step.max(min_step);
        Self {
            endpoint: point.endpoint.clone(),
            metric: point.metric.clone(),
            value: point.value,
            timestamp: align_ts(point.timestamp, step),
            kind: point.kind,
            tags: point.tags.clone(),
        }
    }
}

/// Data-source type understood by the round-robin storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DsType {
    /// Stored as-is
    Gauge,
    /// Stored as a rate; the backend differentiates consecutive values
    Derive,
}

impl fmt::Display for DsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gauge => f.write_str("GAUGE"),
            Self::Derive => f.write_str("DERIVE"),
        }
    }
}

/// Record shape delivered to the storage backend
///
/// Step, heartbeat and the min/max bounds follow the archive format's rules:
/// steps are floored to the configured minimum, the heartbeat is twice the
/// step, and counters are stored as non-negative rates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreRecord {
    /// Reporting endpoint
    pub endpoint: String,
    /// Metric name
    pub metric: String,
    /// Tag pairs
    pub tags: BTreeMap<String, String>,
    /// Value as submitted
    pub value: f64,
    /// Timestamp floor-aligned to `step`
    pub timestamp: i64,
    /// Effective sampling step, never below the configured minimum
    pub step: i64,
    /// Staleness bound: twice the step
    pub heartbeat: i64,
    /// Data-source type derived from the counter kind
    pub ds_type: DsType,
    /// Lower bound ("U" = unbounded)
    pub min: &'static str,
    /// Upper bound ("U" = unbounded)
    pub max: &'static str,
}

impl StoreRecord {
    /// Project a canonical record into the storage wire shape.
    ///
    /// Gauges keep their kind and are unbounded on both sides; counters and
    /// derives are both stored as `DERIVE` with a zero lower bound. The
    /// closed `CounterKind` enum means there is no unrecognized-kind case
    /// left to fail on.
    pub fn from_point(point: &MetricPoint, min_step: i64) -> Self {
        let step = point.step.max(min_step);
        let (ds_type, min, max) = match point.kind {
            CounterKind::Gauge => (DsType::Gauge, "U", "U"),
            CounterKind::Counter | CounterKind::Derive => (DsType::Derive, "0", "U"),
        };
        Self {
            endpoint: point.endpoint.clone(),
            metric: point.metric.clone(),
            tags: point.tags.clone(),
            value: point.value,
            timestamp: align_ts(point.timestamp, step),
            step,
            heartbeat: step * 2,
            ds_type,
            min,
            max,
        }
    }
}

/// Record shape delivered to the time-series backend
///
/// The endpoint folds into the tag set; the timestamp is passed through
/// unaligned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TsdbRecord {
    /// Metric name
    pub metric: String,
    /// Epoch seconds, unaligned
    pub timestamp: i64,
    /// Value as submitted
    pub value: f64,
    /// Tag pairs, including an `endpoint` tag
    pub tags: BTreeMap<String, String>,
}

impl TsdbRecord {
    /// Project a canonical record, folding the endpoint into the tags.
    pub fn from_point(point: &MetricPoint) -> Self {
        let mut tags = point.tags.clone();
        tags.insert("endpoint".to_string(), point.endpoint.clone());
        Self {
            metric: point.metric.clone(),
            timestamp: point.timestamp,
            value: point.value,
            tags,
        }
    }
}
