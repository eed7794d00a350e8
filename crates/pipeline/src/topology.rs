//! Routing topology
//!
//! One immutable object owning the hash rings and destination-queue tables
//! for every enabled backend family. Built once at startup from config and
//! shared by `Arc` into the router, dispatch workers and reporter; replacing
//! the topology means building a new object, never mutating shared tables in
//! place.

use std::collections::HashMap;
use std::sync::Arc;

use relay_config::Config;
use relay_protocol::{AlertRecord, StoreRecord, TsdbRecord};
use relay_routing::HashRing;

use crate::queue::BoundedQueue;

/// Alerting family: ring over node names, one queue per node
#[derive(Debug)]
pub struct AlertFamily {
    /// Consistent hash ring over the node names
    pub ring: HashRing,
    /// Node name -> destination queue
    pub queues: HashMap<String, Arc<BoundedQueue<AlertRecord>>>,
}

/// One storage destination: a physical address and its queue
#[derive(Debug)]
pub struct StoreDest {
    /// Physical backend address
    pub addr: String,
    /// Destination queue for this address
    pub queue: Arc<BoundedQueue<StoreRecord>>,
}

/// Storage family: ring over node names, one queue per (node, address)
///
/// A node is a replication group - a record routed to it is pushed to every
/// address's queue independently.
#[derive(Debug)]
pub struct StoreFamily {
    /// Consistent hash ring over the node names
    pub ring: HashRing,
    /// Node name -> replication group destinations
    pub nodes: HashMap<String, Vec<StoreDest>>,
}

/// Time-series family: a single shared queue, no sharding
#[derive(Debug)]
pub struct TsdbFamily {
    /// Backend address
    pub address: String,
    /// The shared destination queue
    pub queue: Arc<BoundedQueue<TsdbRecord>>,
}

/// The startup-built routing topology
///
/// Disabled families are `None`; the router skips them entirely.
#[derive(Debug)]
pub struct Topology {
    /// Minimum sampling step, floors every alignment
    pub min_step: i64,
    /// Capacity used for every destination queue
    pub queue_capacity: usize,
    /// Alerting family, if enabled
    pub alert: Option<AlertFamily>,
    /// Storage family, if enabled
    pub store: Option<StoreFamily>,
    /// Time-series family, if enabled
    pub tsdb: Option<TsdbFamily>,
}

impl Topology {
    /// Build the topology from validated configuration.
    pub fn from_config(config: &Config) -> Self {
        let capacity = config.global.queue_capacity;

        let alert = config.alert.enabled.then(|| {
            // BTreeMap keys come out sorted, so ring construction order is
            // stable across restarts
            let nodes: Vec<String> = config.alert.cluster.keys().cloned().collect();
            let queues = nodes
                .iter()
                .map(|node| (node.clone(), Arc::new(BoundedQueue::new(capacity))))
                .collect();
            AlertFamily {
                ring: HashRing::new(config.alert.replicas, nodes),
                queues,
            }
        });

        let store = config.store.enabled.then(|| {
            let nodes: Vec<String> = config.store.cluster.keys().cloned().collect();
            let groups = config
                .store
                .cluster
                .iter()
                .map(|(node, group)| {
                    let dests = group
                        .addrs
                        .iter()
                        .map(|addr| StoreDest {
                            addr: addr.clone(),
                            queue: Arc::new(BoundedQueue::new(capacity)),
                        })
                        .collect();
                    (node.clone(), dests)
                })
                .collect();
            StoreFamily {
                ring: HashRing::new(config.store.replicas, nodes),
                nodes: groups,
            }
        });

        let tsdb = config.tsdb.enabled.then(|| TsdbFamily {
            address: config.tsdb.address.clone(),
            queue: Arc::new(BoundedQueue::new(capacity)),
        });

        Self {
            min_step: config.global.min_step,
            queue_capacity: capacity,
            alert,
            store,
            tsdb,
        }
    }

    /// Records queued across all alert destinations
    pub fn alert_backlog(&self) -> usize {
        self.alert
            .as_ref()
            .map(|family| family.queues.values().map(|queue| queue.len()).sum())
            .unwrap_or(0)
    }

    /// Records queued across all store destinations
    pub fn store_backlog(&self) -> usize {
        self.store
            .as_ref()
            .map(|family| {
                family
                    .nodes
                    .values()
                    .flatten()
                    .map(|dest| dest.queue.len())
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Records queued for the tsdb destination
    pub fn tsdb_backlog(&self) -> usize {
        self.tsdb
            .as_ref()
            .map(|family| family.queue.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(toml: &str) -> Config {
        toml.parse().unwrap()
    }

    #[test]
    fn test_disabled_families_absent() {
        let config = config(
            r#"
[alert]
enabled = true

[alert.cluster]
alert-00 = "127.0.0.1:6080"
"#,
        );
        let topology = Topology::from_config(&config);
        assert!(topology.alert.is_some());
        assert!(topology.store.is_none());
        assert!(topology.tsdb.is_none());
    }

    #[test]
    fn test_alert_one_queue_per_node() {
        let config = config(
            r#"
[alert]
enabled = true

[alert.cluster]
alert-00 = "127.0.0.1:6080"
alert-01 = "127.0.0.1:6081"
"#,
        );
        let topology = Topology::from_config(&config);
        let family = topology.alert.unwrap();
        assert_eq!(family.ring.len(), 2);
        assert_eq!(family.queues.len(), 2);
        assert!(family.queues.contains_key("alert-00"));
        assert!(family.queues.contains_key("alert-01"));
    }

    #[test]
    fn test_store_one_queue_per_node_address() {
        let config = config(
            r#"
[store]
enabled = true

[store.cluster.store-00]
addrs = ["10.0.0.1:6070", "10.0.0.2:6070"]

[store.cluster.store-01]
addrs = ["10.0.0.3:6070"]
"#,
        );
        let topology = Topology::from_config(&config);
        let family = topology.store.unwrap();
        assert_eq!(family.ring.len(), 2);
        assert_eq!(family.nodes["store-00"].len(), 2);
        assert_eq!(family.nodes["store-01"].len(), 1);
        // queues are per-destination, not shared within a group
        assert_eq!(family.nodes["store-00"][0].addr, "10.0.0.1:6070");
        assert_eq!(family.nodes["store-00"][1].addr, "10.0.0.2:6070");
    }

    #[test]
    fn test_queue_capacity_from_config() {
        let config = config(
            r#"
[global]
queue_capacity = 8

[tsdb]
enabled = true
address = "127.0.0.1:4242"
"#,
        );
        let topology = Topology::from_config(&config);
        assert_eq!(topology.tsdb.unwrap().queue.capacity(), 8);
    }

    #[test]
    fn test_backlogs_sum_queues() {
        let config = config(
            r#"
[alert]
enabled = true

[alert.cluster]
alert-00 = "127.0.0.1:6080"
alert-01 = "127.0.0.1:6081"
"#,
        );
        let topology = Topology::from_config(&config);
        assert_eq!(topology.alert_backlog(), 0);

        let family = topology.alert.as_ref().unwrap();
        let record = relay_protocol::AlertRecord {
            endpoint: "host1".to_string(),
            metric: "cpu.idle".to_string(),
            value: 1.0,
            timestamp: 0,
            kind: relay_protocol::CounterKind::Gauge,
            tags: Default::default(),
        };
        family.queues["alert-00"].push(record.clone());
        family.queues["alert-01"].push(record.clone());
        family.queues["alert-01"].push(record);
        assert_eq!(topology.alert_backlog(), 3);
        assert_eq!(topology.store_backlog(), 0);
    }
}
