//! The pooled-connection capability

/// Minimal capability a pooled connection must expose
///
/// The pool never touches backend protocol details; it only needs an
/// identity for tracking, a closed-state check, and a way to tear the
/// connection down. Each backend family implements this for its own client
/// type.
pub trait PoolConn: Send {
    /// Pool-assigned identity: `{address}_{sequence}_{unix_time}`
    fn name(&self) -> &str;

    /// True once the underlying transport is gone
    fn closed(&self) -> bool;

    /// Tear the connection down. Must be idempotent.
    fn close(&mut self);
}
