//! HTTP ingress adapter
//!
//! The wire boundary for HTTP producers plus the operator debug surface.
//!
//! # Endpoints
//!
//! - `POST /api/push` - JSON array of raw submissions; replies with
//!   total/invalid counts and latency
//! - `GET /health` - liveness check
//! - `GET /debug/counters` - pipeline counter snapshot
//! - `GET /debug/connpool/{family}` - one diagnostic line per pool
//! - `GET|POST /debug/trace` - inspect / configure the trace probe
//! - `GET|POST /debug/filter` - inspect / configure the filter probe
//!
//! Body decoding stops here: the pipeline only ever sees already-decoded
//! raw submissions.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use relay_config::HttpConfig;
use relay_pipeline::{FilterSpec, PipelineSnapshot, Router};
use relay_pool::ProcSource;
use relay_protocol::{MetricPoint, RawPoint};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::validator::{ingest, Origin};

/// Errors that can take the HTTP ingress down
#[derive(Debug, Error)]
pub enum IngressError {
    /// Could not bind the listen address
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Configured listen address
        address: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The server loop failed
    #[error("http ingress error: {0}")]
    Serve(String),
}

/// Shared state for the HTTP handlers
pub struct HttpState {
    /// The validate-and-route pipeline
    pub router: Arc<Router>,
    /// Pool registries by family name ("alert", "store", "tsdb")
    pub pools: HashMap<&'static str, Arc<dyn ProcSource>>,
    /// Maximum accepted request body size
    pub max_body_bytes: usize,
}

/// HTTP ingress server
pub struct HttpIngress {
    config: HttpConfig,
    state: Arc<HttpState>,
}

impl HttpIngress {
    /// Create the server; nothing binds until `run`.
    pub fn new(config: HttpConfig, state: HttpState) -> Self {
        Self {
            config,
            state: Arc::new(state),
        }
    }

    /// Bind and serve until cancelled.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), IngressError> {
        let address = self.config.listen.clone();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| IngressError::Bind {
                address: address.clone(),
                source,
            })?;

        tracing::info!(address = %address, "http ingress listening");

        let app = build_app(self.state);
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
            .map_err(|e| IngressError::Serve(e.to_string()))?;

        tracing::info!("http ingress stopped");
        Ok(())
    }
}

/// Build the axum application
fn build_app(state: Arc<HttpState>) -> axum::Router {
    axum::Router::new()
        .route("/api/push", post(push))
        .route("/health", get(health))
        .route("/debug/counters", get(counters))
        .route("/debug/connpool/:family", get(connpool))
        .route("/debug/trace", get(trace_get).post(trace_set))
        .route("/debug/filter", get(filter_get).post(filter_set))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

/// GET /health
async fn health() -> &'static str {
    "ok"
}

/// POST /api/push - decode, validate, route, reply with counts
async fn push(State(state): State<Arc<HttpState>>, body: Bytes) -> Response {
    if body.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "blank body");
    }
    if body.len() > state.max_body_bytes {
        return error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!(
                "payload size {} exceeds limit {}",
                body.len(),
                state.max_body_bytes
            ),
        );
    }

    // null entries deserialize to None and are counted invalid downstream
    let batch: Vec<Option<RawPoint>> = match serde_json::from_slice(&body) {
        Ok(batch) => batch,
        Err(error) => {
            return error_response(StatusCode::BAD_REQUEST, format!("decode error: {error}"));
        }
    };

    let reply = ingest(&state.router, &batch, Origin::Http);
    Json(reply).into_response()
}

/// GET /debug/counters
async fn counters(State(state): State<Arc<HttpState>>) -> Json<PipelineSnapshot> {
    Json(state.router.metrics().snapshot())
}

/// GET /debug/connpool/{family}
async fn connpool(State(state): State<Arc<HttpState>>, Path(family): Path<String>) -> Response {
    match state.pools.get(family.as_str()) {
        Some(pools) => (StatusCode::OK, pools.proc().join("\n")).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("unknown backend family '{family}'"),
        ),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TraceBody {
    needle: Option<String>,
}

#[derive(Debug, Serialize)]
struct TraceDump {
    needle: Option<String>,
    hits: Vec<MetricPoint>,
}

/// GET /debug/trace
async fn trace_get(State(state): State<Arc<HttpState>>) -> Json<TraceDump> {
    let probes = state.router.probes();
    Json(TraceDump {
        needle: probes.trace_needle(),
        hits: probes.trace_hits(),
    })
}

/// POST /debug/trace - set or clear the needle
async fn trace_set(
    State(state): State<Arc<HttpState>>,
    Json(body): Json<TraceBody>,
) -> Json<TraceBody> {
    tracing::info!(needle = ?body.needle, "trace probe reconfigured");
    state.router.probes().set_trace(body.needle.clone());
    Json(body)
}

#[derive(Debug, Serialize, Deserialize)]
struct FilterBody {
    spec: Option<FilterSpec>,
}

#[derive(Debug, Serialize)]
struct FilterDump {
    spec: Option<FilterSpec>,
    hits: Vec<MetricPoint>,
}

/// GET /debug/filter
async fn filter_get(State(state): State<Arc<HttpState>>) -> Json<FilterDump> {
    let probes = state.router.probes();
    Json(FilterDump {
        spec: probes.filter_spec(),
        hits: probes.filter_hits(),
    })
}

/// POST /debug/filter - set or clear the spec
async fn filter_set(
    State(state): State<Arc<HttpState>>,
    Json(body): Json<FilterBody>,
) -> Json<FilterBody> {
    tracing::info!(spec = ?body.spec, "filter probe reconfigured");
    state.router.probes().set_filter(body.spec.clone());
    Json(body)
}
