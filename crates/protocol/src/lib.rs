//! Relay protocol types
//!
//! The data model shared by the ingress, router and dispatch layers:
//!
//! - [`RawPoint`] - one heterogeneous submission as producers send it
//! - [`MetricPoint`] - the validated, normalized record the pipeline routes
//! - [`AlertRecord`] / [`StoreRecord`] / [`TsdbRecord`] - per-backend wire
//!   projections of one [`MetricPoint`]
//!
//! A `MetricPoint` is immutable once built; the router reads it several times
//! (once per enabled backend family) and each projection owns its own copy of
//! the fields it needs.

mod point;
mod record;

pub use point::{
    canonical_tags, CounterKind, MetricPoint, RawPoint, RawValue, MAX_NAME_TAGS_LEN,
};
pub use record::{align_ts, AlertRecord, DsType, StoreRecord, TsdbRecord};
