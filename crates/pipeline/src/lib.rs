//! Relay pipeline
//!
//! The routing core between ingress and the backend families:
//!
//! - [`BoundedQueue`] - fixed-capacity destination queues with
//!   drop-on-full backpressure
//! - [`Topology`] - the immutable startup-built object owning hash rings
//!   and the per-destination queue tables
//! - [`Router`] - fans canonical records out to every enabled backend
//!   family, sharding by consistent hashing
//! - [`DispatchWorker`] - long-lived tasks draining one queue each through
//!   a pooled connection
//! - [`Reporter`] - periodic, read-only queue-depth and pool-health
//!   sampling
//! - [`ProbeSet`] - trace/filter hooks consulted on the storage path
//!
//! # Design
//!
//! Queueing decouples ingress throughput from backend write throughput.
//! Every queue push is non-blocking by contract: under backend slowness the
//! queues fill and new pushes are rejected, so backpressure degrades drop
//! counters instead of ingress latency. Per-destination queues bound memory
//! per backend and keep one slow node's backlog isolated from the rest.

mod metrics;
mod probe;
mod queue;
mod reporter;
mod router;
mod topology;
mod worker;


pub use metrics::{DropTracker, PipelineMetrics, PipelineSnapshot};
pub use probe::{FilterOp, FilterSpec, ProbeSet};
pub use queue::BoundedQueue;
pub use reporter::Reporter;
pub use router::Router;
pub use topology::{AlertFamily, StoreDest, StoreFamily, Topology, TsdbFamily};
pub use worker::{DispatchWorker, Transport, WorkerConfig, WorkerMetrics, WorkerSnapshot};
