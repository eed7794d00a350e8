//! Global pipeline settings
//!
//! Knobs shared by the router, destination queues and dispatch workers.

use serde::Deserialize;

/// Default capacity of every destination queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 102_400;

/// Default minimum sampling step in seconds
pub const DEFAULT_MIN_STEP: i64 = 30;

/// Global settings
///
/// # Example
///
/// ```toml
/// [global]
/// min_step = 30
/// queue_capacity = 102400
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Minimum sampling step in seconds. Records with a smaller step are
    /// aligned as if they had this step.
    /// Default: 30
    pub min_step: i64,

    /// Capacity of each destination queue. Pushes beyond this are dropped.
    /// Default: 102400
    pub queue_capacity: usize,

    /// Maximum number of records a dispatch worker drains per delivery.
    /// Default: 200
    pub dispatch_batch: usize,

    /// How long a dispatch worker sleeps when its queue is empty, in
    /// milliseconds.
    /// Default: 50
    pub worker_idle_ms: u64,

    /// Interval between queue-backlog gauge refreshes, in seconds.
    /// Default: 5
    pub backlog_interval_secs: u64,

    /// Interval between connection-pool diagnostic log lines, in seconds.
    /// Default: 3600
    pub pool_log_interval_secs: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            min_step: DEFAULT_MIN_STEP,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            dispatch_batch: 200,
            worker_idle_ms: 50,
            backlog_interval_secs: 5,
            pool_log_interval_secs: 3600,
        }
    }
}
