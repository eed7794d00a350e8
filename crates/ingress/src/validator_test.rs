//! Validator tests

use std::collections::HashMap;
use std::sync::Arc;

use relay_config::Config;
use relay_pipeline::{PipelineMetrics, ProbeSet, Router, Topology};
use relay_protocol::{CounterKind, RawPoint, RawValue};

use crate::validator::{ingest, validate, Origin};

const NOW: i64 = 1_700_000_000;

fn raw(metric: &str, endpoint: &str) -> RawPoint {
    RawPoint {
        metric: metric.to_string(),
        endpoint: endpoint.to_string(),
        tags: HashMap::new(),
        value: Some(RawValue::Float(1.0)),
        kind: "GAUGE".to_string(),
        step: 60,
        timestamp: Some(NOW - 30),
    }
}

fn one(raw: RawPoint) -> Vec<Option<RawPoint>> {
    vec![Some(raw)]
}

#[test]
fn test_valid_submission_accepted() {
    // text value parses, missing timestamp is corrected to the batch clock
    let mut entry = raw("cpu.idle", "host1");
    entry.value = Some(RawValue::Text("3.14".to_string()));
    entry.timestamp = Some(0);

    let result = validate(&one(entry), NOW);
    assert_eq!(result.invalid, 0);
    assert_eq!(result.accepted.len(), 1);

    let point = &result.accepted[0];
    assert_eq!(point.metric, "cpu.idle");
    assert_eq!(point.endpoint, "host1");
    assert_eq!(point.value, 3.14);
    assert_eq!(point.timestamp, NOW);
    assert_eq!(point.kind, CounterKind::Gauge);
}

#[test]
fn test_legacy_hostname_metric_rejected() {
    let mut entry = raw("kernel.hostname", "host1");
    entry.value = Some(RawValue::Text("foo".to_string()));

    let result = validate(&one(entry), NOW);
    assert_eq!(result.invalid, 1);
    assert!(result.accepted.is_empty());
}

#[test]
fn test_null_entry_rejected() {
    let result = validate(&[None, Some(raw("cpu.idle", "host1"))], NOW);
    assert_eq!(result.invalid, 1);
    assert_eq!(result.accepted.len(), 1);
}

#[test]
fn test_empty_metric_or_endpoint_rejected() {
    let result = validate(&one(raw("", "host1")), NOW);
    assert_eq!(result.invalid, 1);

    let result = validate(&one(raw("cpu.idle", "")), NOW);
    assert_eq!(result.invalid, 1);
}

#[test]
fn test_unrecognized_kind_rejected() {
    for kind in ["", "gauge", "HISTOGRAM", "Counter"] {
        let mut entry = raw("cpu.idle", "host1");
        entry.kind = kind.to_string();
        let result = validate(&one(entry), NOW);
        assert_eq!(result.invalid, 1, "kind {kind:?} should be rejected");
    }
}

#[test]
fn test_missing_or_unparseable_value_rejected() {
    let mut entry = raw("cpu.idle", "host1");
    entry.value = None;
    assert_eq!(validate(&one(entry), NOW).invalid, 1);

    let mut entry = raw("cpu.idle", "host1");
    entry.value = Some(RawValue::Text("not-a-number".to_string()));
    assert_eq!(validate(&one(entry), NOW).invalid, 1);
}

#[test]
fn test_value_shapes_coerced() {
    for value in [
        RawValue::Int(3),
        RawValue::Float(3.0),
        RawValue::Text("3".to_string()),
    ] {
        let mut entry = raw("cpu.idle", "host1");
        entry.value = Some(value);
        let result = validate(&one(entry), NOW);
        assert_eq!(result.accepted[0].value, 3.0);
    }
}

#[test]
fn test_non_positive_step_rejected() {
    for step in [0, -1, -60] {
        let mut entry = raw("cpu.idle", "host1");
        entry.step = step;
        assert_eq!(validate(&one(entry), NOW).invalid, 1);
    }
}

#[test]
fn test_oversized_name_and_tags_rejected() {
    let mut entry = raw(&"m".repeat(400), "host1");
    entry
        .tags
        .insert("t".to_string(), "v".repeat(200));
    assert_eq!(validate(&one(entry), NOW).invalid, 1);

    // just under the limit passes: 400 + len("t=" + 108) = 510
    let mut entry = raw(&"m".repeat(400), "host1");
    entry
        .tags
        .insert("t".to_string(), "v".repeat(108));
    assert_eq!(validate(&one(entry), NOW).invalid, 0);
}

#[test]
fn test_implausible_timestamps_corrected() {
    // absent
    let mut entry = raw("cpu.idle", "host1");
    entry.timestamp = None;
    assert_eq!(validate(&one(entry), NOW).accepted[0].timestamp, NOW);

    // non-positive
    let mut entry = raw("cpu.idle", "host1");
    entry.timestamp = Some(-5);
    assert_eq!(validate(&one(entry), NOW).accepted[0].timestamp, NOW);

    // more than twice the current time (corrupt clock)
    let mut entry = raw("cpu.idle", "host1");
    entry.timestamp = Some(NOW * 2 + 1);
    assert_eq!(validate(&one(entry), NOW).accepted[0].timestamp, NOW);

    // plausible values pass through
    let mut entry = raw("cpu.idle", "host1");
    entry.timestamp = Some(NOW - 120);
    assert_eq!(validate(&one(entry), NOW).accepted[0].timestamp, NOW - 120);
}

#[test]
fn test_corrections_share_the_batch_clock() {
    let mut a = raw("a", "host1");
    a.timestamp = None;
    let mut b = raw("b", "host1");
    b.timestamp = Some(0);

    let result = validate(&[Some(a), Some(b)], NOW);
    assert_eq!(result.accepted[0].timestamp, result.accepted[1].timestamp);
}

#[test]
fn test_counts_always_partition_the_batch() {
    let batch = vec![
        Some(raw("cpu.idle", "host1")),
        None,
        Some(raw("", "host1")),
        Some(raw("mem.used", "host2")),
        Some(raw("kernel.hostname", "host1")),
    ];
    let result = validate(&batch, NOW);
    assert_eq!(result.accepted.len() + result.invalid, batch.len());
    assert_eq!(result.accepted.len(), 2);
    assert_eq!(result.invalid, 3);
}

#[test]
fn test_empty_batch() {
    let result = validate(&[], NOW);
    assert_eq!(result.accepted.len(), 0);
    assert_eq!(result.invalid, 0);
}

// ============================================================================
// ingest (validate + route)
// ============================================================================

fn test_router() -> Router {
    let config: Config = r#"
[alert]
enabled = true

[alert.cluster]
alert-00 = "127.0.0.1:6080"
"#
    .parse()
    .unwrap();
    Router::new(
        Arc::new(Topology::from_config(&config)),
        Arc::new(ProbeSet::new()),
        Arc::new(PipelineMetrics::new()),
    )
}

#[test]
fn test_ingest_reply_counts() {
    let router = test_router();
    let batch = vec![Some(raw("cpu.idle", "host1")), Some(raw("", "host1"))];

    let reply = ingest(&router, &batch, Origin::Http);
    assert_eq!(reply.message, "ok");
    assert_eq!(reply.total, 2);
    assert_eq!(reply.invalid, 1);

    let snapshot = router.metrics().snapshot();
    assert_eq!(snapshot.points_received, 1);
    assert_eq!(snapshot.http_received, 1);
    assert_eq!(snapshot.rpc_received, 0);
    assert_eq!(router.topology().alert_backlog(), 1);
}

#[test]
fn test_ingest_origin_counters() {
    let router = test_router();
    ingest(&router, &one(raw("cpu.idle", "host1")), Origin::Rpc);

    let snapshot = router.metrics().snapshot();
    assert_eq!(snapshot.rpc_received, 1);
    assert_eq!(snapshot.http_received, 0);
}

#[test]
fn test_ingest_all_invalid_still_ok() {
    let router = test_router();
    let reply = ingest(&router, &[None, None], Origin::Http);
    assert_eq!(reply.message, "ok");
    assert_eq!(reply.total, 2);
    assert_eq!(reply.invalid, 2);
    assert_eq!(router.metrics().snapshot().points_received, 0);
}
