//! Relay configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! Minimal config should just work - only specify what you need to change.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use relay_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[alert]\nenabled = true\n[alert.cluster]\na = \"127.0.0.1:6080\"").unwrap();
//! assert!(config.alert.enabled);
//! ```
//!
//! # Example Minimal Config
//!
//! ```toml
//! [alert]
//! enabled = true
//!
//! [alert.cluster]
//! alert-00 = "10.0.0.10:6080"
//! ```

mod backends;
mod error;
mod global;
mod ingress;
mod logging;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use backends::{AlertConfig, StoreConfig, StoreNode, TsdbConfig};
pub use error::{ConfigError, Result};
pub use global::{GlobalConfig, DEFAULT_MIN_STEP, DEFAULT_QUEUE_CAPACITY};
pub use ingress::HttpConfig;
pub use logging::{LogConfig, LogFormat, LogLevel};

use serde::Deserialize;

/// Main configuration structure
///
/// All sections are optional with sensible defaults; an entirely empty file
/// fails validation only because every backend family defaults to disabled.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Global pipeline settings (min step, queue capacity, worker knobs)
    pub global: GlobalConfig,

    /// HTTP ingress and debug endpoints
    pub http: HttpConfig,

    /// Alerting backend family
    pub alert: AlertConfig,

    /// Storage backend family
    pub store: StoreConfig,

    /// Time-series backend family
    pub tsdb: TsdbConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, contains invalid TOML,
    /// or fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        contents.parse()
    }

    /// Validate cross-field constraints
    ///
    /// Called automatically by `from_file` and `from_str`.
    pub fn validate(&self) -> Result<()> {
        if !self.alert.enabled && !self.store.enabled && !self.tsdb.enabled {
            return Err(ConfigError::NoBackendsEnabled);
        }

        if self.alert.enabled {
            if self.alert.cluster.is_empty() {
                return Err(ConfigError::EmptyCluster { section: "alert" });
            }
            if self.alert.replicas == 0 {
                return Err(ConfigError::invalid_value(
                    "alert",
                    "replicas",
                    "must be positive",
                ));
            }
        }

        if self.store.enabled {
            if self.store.cluster.is_empty() {
                return Err(ConfigError::EmptyCluster { section: "store" });
            }
            if self.store.replicas == 0 {
                return Err(ConfigError::invalid_value(
                    "store",
                    "replicas",
                    "must be positive",
                ));
            }
            for (node, group) in &self.store.cluster {
                if group.addrs.is_empty() {
                    return Err(ConfigError::invalid_value(
                        "store",
                        "cluster",
                        format!("node '{node}' has no addresses"),
                    ));
                }
            }
        }

        if self.tsdb.enabled && self.tsdb.address.is_empty() {
            return Err(ConfigError::invalid_value(
                "tsdb",
                "address",
                "must be set when tsdb is enabled",
            ));
        }

        if self.global.min_step <= 0 {
            return Err(ConfigError::invalid_value(
                "global",
                "min_step",
                "must be positive",
            ));
        }
        if self.global.queue_capacity == 0 {
            return Err(ConfigError::invalid_value(
                "global",
                "queue_capacity",
                "must be positive",
            ));
        }
        if self.global.dispatch_batch == 0 {
            return Err(ConfigError::invalid_value(
                "global",
                "dispatch_batch",
                "must be positive",
            ));
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
