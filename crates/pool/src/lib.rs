//! Relay connection pooling
//!
//! A bounded, thread-safe pool of reusable backend connections, plus a
//! per-address registry for whole-cluster lifecycle and diagnostics.
//!
//! # Design
//!
//! - [`PoolConn`] is the minimal capability a pooled connection must expose
//!   (name, closed-state, close). Each backend family implements it for its
//!   own client type, keeping the pool backend-agnostic.
//! - [`ConnPool`] lazily creates connections through a caller-supplied
//!   factory, reuses idle ones first, fails fast with
//!   [`PoolError::Exhausted`] at the active bound, and closes idle
//!   connections beyond the idle bound instead of retaining them.
//! - [`PoolRegistry`] owns one pool per distinct backend address.
//!
//! Pool exhaustion is backpressure, not failure: callers back off and retry,
//! they are never blocked waiting for capacity.
//!
//! # Example
//!
//! ```
//! use relay_pool::{ConnPool, PoolConn};
//!
//! struct Conn { name: String, closed: bool }
//! impl PoolConn for Conn {
//!     fn name(&self) -> &str { &self.name }
//!     fn closed(&self) -> bool { self.closed }
//!     fn close(&mut self) { self.closed = true; }
//! }
//!
//! let pool = ConnPool::new(
//!     "alert-00",
//!     "127.0.0.1:6080",
//!     4,
//!     2,
//!     Box::new(|name: &str| Ok(Conn { name: name.to_string(), closed: false })),
//! );
//! let conn = pool.fetch().unwrap();
//! pool.release(conn);
//! ```

mod conn;
mod error;
mod pool;
mod registry;


pub use conn::PoolConn;
pub use error::{BoxError, PoolError, Result};
pub use pool::{ConnFactory, ConnPool};
pub use registry::{PoolRegistry, ProcSource};
