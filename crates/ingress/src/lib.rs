//! Relay ingress
//!
//! The boundary where raw metric submissions enter the pipeline:
//!
//! - [`validate`] / [`ingest`] - normalize heterogeneous raw submissions
//!   into canonical records, rejecting malformed entries individually, then
//!   hand the batch to the router
//! - [`HttpIngress`] - the HTTP adapter: JSON push endpoint plus the debug
//!   endpoints for pool diagnostics and the trace/filter probes
//!
//! Validation never fails a batch: callers always get a structured reply
//! with total/invalid counts and latency, however malformed the input or
//! however backed up the destinations.
//!
//! The RPC ingress path lives outside this crate; it calls [`ingest`] with
//! [`Origin::Rpc`] and builds its own wire reply from the [`IngestReply`].

mod http;
mod validator;

#[cfg(test)]
mod validator_test;

pub use http::{HttpIngress, HttpState, IngressError};
pub use validator::{ingest, validate, IngestReply, Origin, Validated};
