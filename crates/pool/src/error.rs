//! Pool error types

use thiserror::Error;

/// Boxed error returned by connection factories
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors that can occur when fetching a connection
#[derive(Debug, Error)]
pub enum PoolError {
    /// Every allowed connection is already live; callers should treat this
    /// as backpressure and back off, not as a fatal error.
    #[error("connection pool '{name}' exhausted: {active} active of {max_conns} allowed")]
    Exhausted {
        /// Pool name
        name: String,
        /// Live connections at the time of the call
        active: usize,
        /// Configured bound
        max_conns: usize,
    },

    /// The connection factory failed; nothing was added to the pool.
    #[error("connection factory failed for '{name}': {source}")]
    Factory {
        /// Name the connection would have carried
        name: String,
        /// Factory error
        #[source]
        source: BoxError,
    },
}

impl PoolError {
    /// True if this is the exhausted (backpressure) condition
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message() {
        let err = PoolError::Exhausted {
            name: "alert-00".to_string(),
            active: 4,
            max_conns: 4,
        };
        assert!(err.is_exhausted());
        assert!(err.to_string().contains("alert-00"));
        assert!(err.to_string().contains("4 active of 4"));
    }

    #[test]
    fn test_factory_message() {
        let err = PoolError::Factory {
            name: "127.0.0.1:6080_0_0".to_string(),
            source: "connection refused".into(),
        };
        assert!(!err.is_exhausted());
        assert!(err.to_string().contains("connection refused") || err.to_string().contains("factory"));
    }
}
