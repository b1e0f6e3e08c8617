//! Top-level configuration.

use std::time::Duration;

use crate::link::DEFAULT_ACTIVATION_TIMEOUT;
use crate::receive::DEFAULT_HISTORY_CAPACITY;
use crate::throttle::ThrottleConfig;

/// Configuration for one relay endpoint.
#[derive(Debug, Clone)]
pub struct TetherConfig {
    /// Throttle policy parameters.
    pub throttle: ThrottleConfig,

    /// Bound on the receive-side history buffer.
    pub history_capacity: usize,

    /// Bounded wait for session activation at tracking start.
    pub activation_timeout: Duration,

    /// Consecutive activation failures before the condition surfaces as a
    /// fault; single failures recover silently.
    pub activation_failure_threshold: u32,

    /// Age past which the latest sample counts as stale.
    pub stale_after: Duration,

    /// Depth of the tracker's inbound event queue.
    pub event_queue_depth: usize,
}

impl Default for TetherConfig {
    fn default() -> Self {
        Self {
            throttle: ThrottleConfig::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            activation_timeout: DEFAULT_ACTIVATION_TIMEOUT,
            activation_failure_threshold: 3,
            stale_after: Duration::from_secs(60),
            event_queue_depth: 64,
        }
    }
}
