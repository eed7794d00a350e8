//! Backend family configuration
//!
//! Three downstream families: `alert` (threshold evaluation), `store`
//! (round-robin archive storage) and `tsdb` (external time-series store).
//! Alert and store shard by consistent hashing over a named node set; tsdb
//! is a single shared destination.

use std::collections::BTreeMap;

use serde::Deserialize;

fn default_replicas() -> usize {
    500
}

fn default_max_conns() -> usize {
    32
}

fn default_max_idle() -> usize {
    32
}

fn default_conn_timeout_ms() -> u64 {
    1000
}

fn default_call_timeout_ms() -> u64 {
    5000
}

/// Alerting backend cluster
///
/// Each node owns exactly one address.
///
/// # Example
///
/// ```toml
/// [alert]
/// enabled = true
/// replicas = 500
///
/// [alert.cluster]
/// alert-00 = "10.0.0.10:6080"
/// alert-01 = "10.0.0.11:6080"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Whether records are fanned out to this family
    pub enabled: bool,

    /// Virtual points per node on the hash ring
    #[serde(default = "default_replicas")]
    pub replicas: usize,

    /// Maximum concurrently loaned connections per address
    #[serde(default = "default_max_conns")]
    pub max_conns: usize,

    /// Maximum idle connections retained per address
    #[serde(default = "default_max_idle")]
    pub max_idle: usize,

    /// Connect timeout in milliseconds (consumed by the connection factory)
    #[serde(default = "default_conn_timeout_ms")]
    pub conn_timeout_ms: u64,

    /// Per-call timeout in milliseconds (consumed by the transport)
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Node name -> address
    pub cluster: BTreeMap<String, String>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            replicas: default_replicas(),
            max_conns: default_max_conns(),
            max_idle: default_max_idle(),
            conn_timeout_ms: default_conn_timeout_ms(),
            call_timeout_ms: default_call_timeout_ms(),
            cluster: BTreeMap::new(),
        }
    }
}

/// One storage node: a replication group of addresses that all receive the
/// node's records
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreNode {
    /// Physical addresses belonging to this node
    pub addrs: Vec<String>,
}

/// Storage backend cluster
///
/// A node may own several addresses; a record routed to the node is
/// replicated to every address.
///
/// # Example
///
/// ```toml
/// [store]
/// enabled = true
///
/// [store.cluster.store-00]
/// addrs = ["10.0.1.10:6070", "10.0.1.11:6070"]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Whether records are fanned out to this family
    pub enabled: bool,

    /// Virtual points per node on the hash ring
    #[serde(default = "default_replicas")]
    pub replicas: usize,

    /// Maximum concurrently loaned connections per address
    #[serde(default = "default_max_conns")]
    pub max_conns: usize,

    /// Maximum idle connections retained per address
    #[serde(default = "default_max_idle")]
    pub max_idle: usize,

    /// Connect timeout in milliseconds
    #[serde(default = "default_conn_timeout_ms")]
    pub conn_timeout_ms: u64,

    /// Per-call timeout in milliseconds
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Node name -> replication group
    pub cluster: BTreeMap<String, StoreNode>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            replicas: default_replicas(),
            max_conns: default_max_conns(),
            max_idle: default_max_idle(),
            conn_timeout_ms: default_conn_timeout_ms(),
            call_timeout_ms: default_call_timeout_ms(),
            cluster: BTreeMap::new(),
        }
    }
}

/// Time-series backend
///
/// A single shared destination; no sharding.
///
/// # Example
///
/// ```toml
/// [tsdb]
/// enabled = true
/// address = "10.0.2.10:4242"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TsdbConfig {
    /// Whether records are fanned out to this family
    pub enabled: bool,

    /// Backend address
    pub address: String,

    /// Maximum concurrently loaned connections
    #[serde(default = "default_max_conns")]
    pub max_conns: usize,

    /// Maximum idle connections retained
    #[serde(default = "default_max_idle")]
    pub max_idle: usize,

    /// Connect timeout in milliseconds
    #[serde(default = "default_conn_timeout_ms")]
    pub conn_timeout_ms: u64,

    /// Per-call timeout in milliseconds
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

impl Default for TsdbConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: String::new(),
            max_conns: default_max_conns(),
            max_idle: default_max_idle(),
            conn_timeout_ms: default_conn_timeout_ms(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

impl StoreConfig {
    /// Deduplicated set of every address in the cluster, in sorted order
    pub fn distinct_addrs(&self) -> Vec<String> {
        let mut addrs: Vec<String> = self
            .cluster
            .values()
            .flat_map(|node| node.addrs.iter().cloned())
            .collect();
        addrs.sort();
        addrs.dedup();
        addrs
    }
}
