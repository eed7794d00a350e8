//! Routing error types

use thiserror::Error;

/// Result type for routing operations
pub type Result<T> = std::result::Result<T, RoutingError>;

/// Errors that can occur during node resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// The ring was built from an empty node set
    #[error("hash ring is empty - no nodes to route to")]
    EmptyRing,
}
