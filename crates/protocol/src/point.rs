//! Raw submissions and the canonical metric point

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum combined length of a metric name and its canonical tag string.
///
/// Entries above this are rejected at validation; downstream storage keys
/// records by `metric/tags` and cannot index longer names.
pub const MAX_NAME_TAGS_LEN: usize = 510;

/// Counter semantics of a submitted value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CounterKind {
    /// Instantaneous value, stored as-is
    Gauge,
    /// Monotonic counter, differentiated by the storage backend
    Counter,
    /// Pre-differentiated counter
    Derive,
}

impl CounterKind {
    /// Parse the wire representation. Only the three exact uppercase names
    /// are recognized; anything else is an invalid submission.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GAUGE" => Some(Self::Gauge),
            "COUNTER" => Some(Self::Counter),
            "DERIVE" => Some(Self::Derive),
            _ => None,
        }
    }

    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gauge => "GAUGE",
            Self::Counter => "COUNTER",
            Self::Derive => "DERIVE",
        }
    }
}

impl fmt::Display for CounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A submitted value before coercion
///
/// Producers send numbers either natively or as decimal text; everything is
/// coerced to `f64` during validation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// Integer submission
    Int(i64),
    /// Float submission
    Float(f64),
    /// Decimal text submission
    Text(String),
}

impl RawValue {
    /// Coerce to `f64`. Returns `None` if the text form does not parse.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(s) => s.parse().ok(),
        }
    }
}

/// One raw ingress submission
///
/// Field shapes are deliberately loose - the validator, not the
/// deserializer, decides what is acceptable, so one malformed entry never
/// poisons its batch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPoint {
    /// Metric name
    pub metric: String,

    /// Reporting endpoint identity
    pub endpoint: String,

    /// Opaque tag pairs
    pub tags: HashMap<String, String>,

    /// Submitted value; absent values are invalid
    pub value: Option<RawValue>,

    /// Counter kind, wire form ("GAUGE" | "COUNTER" | "DERIVE")
    #[serde(rename = "counter_type")]
    pub kind: String,

    /// Sampling step in seconds
    pub step: i64,

    /// Submission timestamp in epoch seconds; corrected when missing or
    /// implausible
    pub timestamp: Option<i64>,
}

/// Render a tag set in canonical form: keys sorted, `k=v` joined by commas.
///
/// Identical tag sets always produce identical strings, which keeps routing
/// keys and storage keys stable.
pub fn canonical_tags(tags: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (i, (k, v)) in tags.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(k);
        out.push('=');
        out.push_str(v);
    }
    out
}

/// The canonical, validated record the pipeline routes
///
/// Invariants (enforced by the validator, relied on everywhere else):
/// metric and endpoint are non-empty, `step > 0`, and
/// `metric.len() + tag_string().len() <= MAX_NAME_TAGS_LEN`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPoint {
    /// Metric name
    pub metric: String,

    /// Reporting endpoint identity
    pub endpoint: String,

    /// Epoch seconds, already corrected against the batch clock
    pub timestamp: i64,

    /// Sampling step in seconds, always positive
    pub step: i64,

    /// Counter semantics
    pub kind: CounterKind,

    /// Tag pairs; `BTreeMap` keeps serialization deterministic
    pub tags: BTreeMap<String, String>,

    /// Value coerced to a 64-bit float
    pub value: f64,
}

impl MetricPoint {
    /// Canonical tag string (`k1=v1,k2=v2`, keys sorted)
    pub fn tag_string(&self) -> String {
        canonical_tags(&self.tags)
    }

    /// Routing key: `endpoint/metric` or `endpoint/metric/tags`
    ///
    /// Same record, same key - the key feeds both the hash ring lookup and
    /// the trace/filter probes.
    pub fn routing_key(&self) -> String {
        if self.tags.is_empty() {
            format!("{}/{}", self.endpoint, self.metric)
        } else {
            format!("{}/{}/{}", self.endpoint, self.metric, self.tag_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_with_tags(tags: &[(&str, &str)]) -> MetricPoint {
        MetricPoint {
            metric: "cpu.idle".to_string(),
            endpoint: "host1".to_string(),
            timestamp: 1_700_000_000,
            step: 60,
            kind: CounterKind::Gauge,
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            value: 3.14,
        }
    }

    #[test]
    fn test_counter_kind_parse() {
        assert_eq!(CounterKind::parse("GAUGE"), Some(CounterKind::Gauge));
        assert_eq!(CounterKind::parse("COUNTER"), Some(CounterKind::Counter));
        assert_eq!(CounterKind::parse("DERIVE"), Some(CounterKind::Derive));
        assert_eq!(CounterKind::parse("gauge"), None);
        assert_eq!(CounterKind::parse(""), None);
        assert_eq!(CounterKind::parse("HISTOGRAM"), None);
    }

    #[test]
    fn test_raw_value_coercion() {
        assert_eq!(RawValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(RawValue::Float(3.14).as_f64(), Some(3.14));
        assert_eq!(RawValue::Text("3.14".to_string()).as_f64(), Some(3.14));
        assert_eq!(RawValue::Text("1e3".to_string()).as_f64(), Some(1000.0));
        assert_eq!(RawValue::Text("foo".to_string()).as_f64(), None);
        assert_eq!(RawValue::Text(String::new()).as_f64(), None);
    }

    #[test]
    fn test_raw_value_untagged_deserialize() {
        let v: RawValue = serde_json::from_str("3").unwrap();
        assert_eq!(v, RawValue::Int(3));
        let v: RawValue = serde_json::from_str("3.14").unwrap();
        assert_eq!(v, RawValue::Float(3.14));
        let v: RawValue = serde_json::from_str("\"3.14\"").unwrap();
        assert_eq!(v, RawValue::Text("3.14".to_string()));
        assert!(serde_json::from_str::<RawValue>("[1]").is_err());
    }

    #[test]
    fn test_raw_point_loose_deserialize() {
        let raw: RawPoint = serde_json::from_str(
            r#"{"metric":"cpu.idle","endpoint":"host1","value":"3.14","counter_type":"GAUGE","step":60}"#,
        )
        .unwrap();
        assert_eq!(raw.metric, "cpu.idle");
        assert_eq!(raw.value, Some(RawValue::Text("3.14".to_string())));
        assert_eq!(raw.timestamp, None);
        assert!(raw.tags.is_empty());

        // missing fields fall back to defaults instead of failing the batch
        let raw: RawPoint = serde_json::from_str("{}").unwrap();
        assert!(raw.metric.is_empty());
        assert_eq!(raw.value, None);
    }

    #[test]
    fn test_canonical_tags_sorted() {
        let point = point_with_tags(&[("core", "0"), ("az", "west")]);
        assert_eq!(point.tag_string(), "az=west,core=0");
    }

    #[test]
    fn test_canonical_tags_identical_sets_identical_strings() {
        let a = point_with_tags(&[("b", "2"), ("a", "1")]);
        let b = point_with_tags(&[("a", "1"), ("b", "2")]);
        assert_eq!(a.tag_string(), b.tag_string());
    }

    #[test]
    fn test_routing_key_without_tags() {
        let point = point_with_tags(&[]);
        assert_eq!(point.routing_key(), "host1/cpu.idle");
    }

    #[test]
    fn test_routing_key_with_tags() {
        let point = point_with_tags(&[("core", "0")]);
        assert_eq!(point.routing_key(), "host1/cpu.idle/core=0");
    }

    #[test]
    fn test_routing_key_is_pure() {
        let point = point_with_tags(&[("core", "0"), ("az", "west")]);
        assert_eq!(point.routing_key(), point.routing_key());
    }
}
