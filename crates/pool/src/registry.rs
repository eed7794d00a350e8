//! Per-address pool registry for one backend family

use std::collections::HashMap;
use std::sync::Arc;

use crate::conn::PoolConn;
use crate::pool::{ConnFactory, ConnPool};

/// Read-only diagnostic dump, one line per pool
///
/// Lets heterogeneous registries (different connection types per backend
/// family) sit behind one reporting surface.
pub trait ProcSource: Send + Sync {
    /// One diagnostic line per owned pool
    fn proc(&self) -> Vec<String>;
}

/// Owns one [`ConnPool`] per distinct backend address
///
/// Built once at startup from the deduplicated address set of a cluster.
/// The registry itself is immutable after construction; the pools inside it
/// do their own locking.
pub struct PoolRegistry<C: PoolConn> {
    pools: HashMap<String, Arc<ConnPool<C>>>,
}

impl<C: PoolConn> PoolRegistry<C> {
    /// Build a registry over `addresses`, one pool per distinct address.
    ///
    /// `make_factory` is invoked once per address to produce that pool's
    /// connection factory (typically a closure capturing the address and the
    /// family's timeout settings).
    pub fn new<F>(
        addresses: &[String],
        max_conns: usize,
        max_idle: usize,
        make_factory: F,
    ) -> Self
    where
        F: Fn(&str) -> ConnFactory<C>,
    {
        let mut pools = HashMap::new();
        for address in addresses {
            pools
                .entry(address.clone())
                .or_insert_with(|| {
                    Arc::new(ConnPool::new(
                        address.clone(),
                        address.clone(),
                        max_conns,
                        max_idle,
                        make_factory(address),
                    ))
                });
        }
        Self { pools }
    }

    /// Pool for one address, if the registry owns it
    pub fn get(&self, address: &str) -> Option<&Arc<ConnPool<C>>> {
        self.pools.get(address)
    }

    /// Number of owned pools
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// True if no pools are owned
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Owned addresses, sorted
    pub fn addresses(&self) -> Vec<&str> {
        let mut addrs: Vec<&str> = self.pools.keys().map(String::as_str).collect();
        addrs.sort_unstable();
        addrs
    }

    /// Destroy every owned pool (shutdown)
    pub fn destroy(&self) {
        for pool in self.pools.values() {
            pool.destroy();
        }
    }
}

impl<C: PoolConn + Sync> ProcSource for PoolRegistry<C> {
    fn proc(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.pools.values().map(|pool| pool.proc()).collect();
        lines.sort_unstable();
        lines
    }
}
