//! Configuration error types

use std::io;
use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// Path to the file
        path: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Validation error - invalid value in a section
    #[error("[{section}] has invalid {field}: {message}")]
    InvalidValue {
        /// Config section (e.g. "alert", "store")
        section: &'static str,
        /// Field name
        field: &'static str,
        /// Error message
        message: String,
    },

    /// An enabled backend has no cluster nodes to route to
    #[error("[{section}] is enabled but its cluster is empty")]
    EmptyCluster {
        /// Config section
        section: &'static str,
    },

    /// Nothing to route to
    #[error("no backends are enabled - at least one of alert/store/tsdb must be enabled")]
    NoBackendsEnabled,
}

impl ConfigError {
    /// Create an InvalidValue error
    pub fn invalid_value(
        section: &'static str,
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            section,
            field,
            message: message.into(),
        }
    }
}
