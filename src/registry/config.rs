//! Registry configuration

use std::time::Duration;

/// Reason sent to a publisher evicted by a newer one
pub const REPLACED_REASON: &str = "replaced";

/// Configuration for [`SessionRegistry`](super::SessionRegistry)
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Per-session outbound queue length; messages beyond it are dropped
    pub outbound_capacity: usize,

    /// How often the stats task logs a summary (zero disables it)
    pub stats_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            stats_interval: Duration::from_secs(30),
        }
    }
}

impl RegistryConfig {
    /// Set the per-session outbound queue length
    pub fn outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    /// Set the stats logging interval
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }
}
