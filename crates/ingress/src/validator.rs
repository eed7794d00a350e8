//! Batch validation and the validate-and-route entry point

use std::collections::BTreeMap;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use relay_pipeline::Router;
use relay_protocol::{canonical_tags, CounterKind, MetricPoint, RawPoint, MAX_NAME_TAGS_LEN};
use serde::Serialize;

/// Old agents submitted this metric with a string value; the format is no
/// longer supported and such entries are rejected outright.
const LEGACY_HOSTNAME_METRIC: &str = "kernel.hostname";

/// Which ingress path a batch arrived over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// HTTP push endpoint
    Http,
    /// RPC server
    Rpc,
}

impl Origin {
    /// Tag value used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Rpc => "rpc",
        }
    }
}

/// Outcome of validating one batch
#[derive(Debug)]
pub struct Validated {
    /// Canonical records, in submission order
    pub accepted: Vec<MetricPoint>,
    /// Entries rejected individually
    pub invalid: usize,
}

/// Reply returned to the ingress adapter for response construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReply {
    /// Always "ok" - partially invalid batches still succeed
    pub message: String,
    /// Entries submitted, valid or not
    pub total: usize,
    /// Entries rejected by validation
    pub invalid: usize,
    /// Validate-and-route processing time
    pub latency_ms: u64,
}

/// Validate a batch of raw submissions against one consistent clock.
///
/// Each violation rejects only its own entry; the batch itself always
/// succeeds, so `accepted.len() + invalid == batch.len()` holds for every
/// input. `now` is read once per batch - every corrected timestamp within a
/// batch gets the same value.
pub fn validate(batch: &[Option<RawPoint>], now: i64) -> Validated {
    let mut accepted = Vec::with_capacity(batch.len());
    let mut invalid = 0usize;

    for entry in batch {
        match canonicalize(entry.as_ref(), now) {
            Some(point) => accepted.push(point),
            None => invalid += 1,
        }
    }

    Validated { accepted, invalid }
}

/// Normalize one raw submission, or reject it with `None`.
fn canonicalize(raw: Option<&RawPoint>, now: i64) -> Option<MetricPoint> {
    let raw = raw?;

    if raw.metric.is_empty() || raw.endpoint.is_empty() {
        return None;
    }
    if raw.metric == LEGACY_HOSTNAME_METRIC {
        return None;
    }

    let kind = CounterKind::parse(&raw.kind)?;
    let value = raw.value.as_ref()?.as_f64()?;

    if raw.step <= 0 {
        return None;
    }

    let tags: BTreeMap<String, String> = raw
        .tags
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if raw.metric.len() + canonical_tags(&tags).len() > MAX_NAME_TAGS_LEN {
        return None;
    }

    // missing, non-positive or implausibly-future timestamps (corrupt
    // clocks) are replaced with the batch clock
    let timestamp = match raw.timestamp {
        Some(ts) if ts > 0 && ts <= now * 2 => ts,
        _ => now,
    };

    Some(MetricPoint {
        metric: raw.metric.clone(),
        endpoint: raw.endpoint.clone(),
        timestamp,
        step: raw.step,
        kind,
        tags,
        value,
    })
}

/// Validate a batch and fan the accepted records out to every enabled
/// backend family.
///
/// This is the whole ingress-facing surface: adapters decode their wire
/// format into raw submissions, call this, and build their protocol reply
/// from the returned counts.
pub fn ingest(router: &Router, batch: &[Option<RawPoint>], origin: Origin) -> IngestReply {
    let start = Instant::now();
    let now = unix_now();

    let validated = validate(batch, now);

    let accepted = validated.accepted.len() as u64;
    let metrics = router.metrics();
    metrics.record_received(accepted);
    match origin {
        Origin::Http => metrics.record_http_received(accepted),
        Origin::Rpc => metrics.record_rpc_received(accepted),
    }

    router.route(&validated.accepted);

    if validated.invalid > 0 {
        tracing::debug!(
            origin = origin.as_str(),
            total = batch.len(),
            invalid = validated.invalid,
            "batch partially invalid"
        );
    }

    IngestReply {
        message: "ok".to_string(),
        total: batch.len(),
        invalid: validated.invalid,
        latency_ms: start.elapsed().as_millis() as u64,
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
