//! Consistent hash ring with virtual nodes

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use crate::error::{Result, RoutingError};

/// Immutable consistent hash ring
///
/// Maps arbitrary keys deterministically onto a fixed node set. Each node is
/// placed at `replicas` hashed positions; a key resolves to the first
/// position at or after its own hash, wrapping to the ring start.
///
/// The ring never changes after construction, so it is safe to share behind
/// an `Arc` and read from any number of tasks without locking. Replacing the
/// node set means building a new ring and swapping the whole object.
#[derive(Debug, Clone)]
pub struct HashRing {
    /// Virtual point hash -> index into `nodes`
    ring: BTreeMap<u64, usize>,
    /// Physical node names, in construction order
    nodes: Vec<String>,
    /// Virtual points per node
    replicas: usize,
}

impl HashRing {
    /// Build a ring from a node list.
    ///
    /// `replicas` below 1 is clamped to 1. An empty node list produces an
    /// empty ring; every lookup on it returns [`RoutingError::EmptyRing`].
    pub fn new(replicas: usize, nodes: Vec<String>) -> Self {
        let replicas = replicas.max(1);
        let mut ring = BTreeMap::new();

        for (index, node) in nodes.iter().enumerate() {
            for replica in 0..replicas {
                ring.insert(Self::hash(&format!("{node}#{replica}")), index);
            }
        }

        Self {
            ring,
            nodes,
            replicas,
        }
    }

    /// Resolve a key to a node name.
    ///
    /// Pure: for a fixed node set and replica factor, the same key always
    /// resolves to the same node.
    pub fn node(&self, key: &str) -> Result<&str> {
        let hash = Self::hash(key);

        // first virtual point clockwise, wrapping to the ring start
        let index = self
            .ring
            .range(hash..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, &index)| index)
            .ok_or(RoutingError::EmptyRing)?;

        Ok(&self.nodes[index])
    }

    /// Number of physical nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the ring has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Virtual points per node
    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Physical node names
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    fn hash(s: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        hasher.finish()
    }
}
