//! HTTP ingress configuration

use serde::Deserialize;

/// HTTP ingress configuration
///
/// # Example
///
/// ```toml
/// [http]
/// enabled = true
/// listen = "0.0.0.0:6060"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Whether the HTTP ingress is enabled
    /// Default: true
    pub enabled: bool,

    /// Listen address for the HTTP ingress and debug endpoints
    /// Default: "0.0.0.0:6060"
    pub listen: String,

    /// Maximum accepted request body size in bytes
    /// Default: 16 MiB
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: "0.0.0.0:6060".to_string(),
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}
