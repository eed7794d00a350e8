//! Bounded connection pool for one backend address

use std::collections::{HashSet, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;

use crate::conn::PoolConn;
use crate::error::{BoxError, PoolError, Result};

/// Caller-supplied connection factory
///
/// Receives the identity the new connection must carry. Implementations own
/// their timeout policy and must clean up any partially-established transport
/// before returning an error - a failed call leaves nothing behind.
pub type ConnFactory<C> =
    Box<dyn Fn(&str) -> std::result::Result<C, BoxError> + Send + Sync>;

struct PoolInner<C> {
    /// Live connections: on loan + idle. Never exceeds `max_conns`.
    active: usize,
    /// Cumulative creation counter, feeds connection identities
    created: u64,
    /// Idle connections ready for reuse. Never exceeds `max_idle`.
    free: VecDeque<C>,
    /// Names of every live connection this pool accounts for
    tracked: HashSet<String>,
}

/// Bounded, thread-safe pool of reusable connections to one backend address
///
/// All mutating operations serialize on one pool-wide lock; [`proc`] takes a
/// read lock only.
///
/// Lifecycle per connection: created lazily by [`fetch`] when the free list
/// is empty and the active bound allows it; loaned to exactly one caller at a
/// time; returned by [`release`] to the free list, or destroyed there if the
/// free list is full; destroyed unconditionally by [`force_close`] when the
/// caller knows it is broken.
///
/// [`destroy`] ordering guarantee: it serializes on the pool lock like every
/// other operation, closes all idle connections and resets the bookkeeping.
/// A connection still on loan at that moment is closed when its holder calls
/// `release` or `force_close` - it is never resurrected into the new
/// bookkeeping, and nothing leaks.
///
/// [`fetch`]: ConnPool::fetch
/// [`release`]: ConnPool::release
/// [`force_close`]: ConnPool::force_close
/// [`destroy`]: ConnPool::destroy
/// [`proc`]: ConnPool::proc
pub struct ConnPool<C: PoolConn> {
    name: String,
    address: String,
    max_conns: usize,
    max_idle: usize,
    factory: ConnFactory<C>,
    inner: RwLock<PoolInner<C>>,
}

impl<C: PoolConn> ConnPool<C> {
    /// Create an empty pool. No connection is made until the first `fetch`.
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        max_conns: usize,
        max_idle: usize,
        factory: ConnFactory<C>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            max_conns,
            max_idle,
            factory,
            inner: RwLock::new(PoolInner {
                active: 0,
                created: 0,
                free: VecDeque::new(),
                tracked: HashSet::new(),
            }),
        }
    }

    /// Pool name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backend address this pool connects to
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Borrow a connection.
    ///
    /// Prefers an idle connection; otherwise creates one through the factory
    /// if the active bound allows. Fails fast with [`PoolError::Exhausted`]
    /// at the bound - callers must treat that as backpressure. Factory
    /// errors propagate unchanged in [`PoolError::Factory`] and leave the
    /// pool state untouched.
    pub fn fetch(&self) -> Result<C> {
        let mut inner = self.inner.write();

        if let Some(conn) = inner.free.pop_front() {
            return Ok(conn);
        }

        if inner.active >= self.max_conns {
            return Err(PoolError::Exhausted {
                name: self.name.clone(),
                active: inner.active,
                max_conns: self.max_conns,
            });
        }

        let conn_name = format!("{}_{}_{}", self.address, inner.created, unix_now());
        let conn = (self.factory)(&conn_name).map_err(|source| PoolError::Factory {
            name: conn_name.clone(),
            source,
        })?;

        inner.created += 1;
        inner.active += 1;
        inner.tracked.insert(conn.name().to_string());
        Ok(conn)
    }

    /// Return a borrowed connection.
    ///
    /// Re-idles it unless the free list is already at `max_idle`, in which
    /// case the connection is closed and the active count drops - idle
    /// retention never grows past the configured bound. A connection whose
    /// pool was destroyed while it was on loan is simply closed.
    pub fn release(&self, mut conn: C) {
        let mut inner = self.inner.write();

        if !inner.tracked.contains(conn.name()) {
            // destroyed while on loan
            conn.close();
            return;
        }

        if inner.free.len() >= self.max_idle {
            let name = conn.name().to_string();
            conn.close();
            inner.tracked.remove(&name);
            inner.active = inner.active.saturating_sub(1);
        } else {
            inner.free.push_back(conn);
        }
    }

    /// Destroy a borrowed connection known to be broken.
    ///
    /// It is closed and dropped from the bookkeeping; it must never return
    /// to the idle list.
    pub fn force_close(&self, mut conn: C) {
        let mut inner = self.inner.write();

        let name = conn.name().to_string();
        conn.close();
        if inner.tracked.remove(&name) {
            inner.active = inner.active.saturating_sub(1);
        }
    }

    /// Close every idle connection and reset the bookkeeping.
    ///
    /// Intended for shutdown. Connections still on loan are closed by the
    /// `release`/`force_close` of their holders (see the type-level
    /// ordering guarantee).
    pub fn destroy(&self) {
        let mut inner = self.inner.write();

        for conn in inner.free.iter_mut() {
            if !conn.closed() {
                conn.close();
            }
        }
        inner.free.clear();
        inner.tracked.clear();
        inner.active = 0;
    }

    /// Live connections (on loan + idle)
    pub fn active(&self) -> usize {
        self.inner.read().active
    }

    /// Idle connections ready for reuse
    pub fn idle(&self) -> usize {
        self.inner.read().free.len()
    }

    /// One-line diagnostic snapshot
    pub fn proc(&self) -> String {
        let inner = self.inner.read();
        format!(
            "name={} address={} created={} active={} tracked={} idle={}",
            self.name,
            self.address,
            inner.created,
            inner.active,
            inner.tracked.len(),
            inner.free.len()
        )
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
