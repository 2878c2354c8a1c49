//! Network-wide constants, gathered into a [`Configuration`] the way a
//! `Factory` gathers them, minus the options that don't apply to the
//! routing/lookup core (storage sizing, blob limits) and options that don't
//! apply to an all-settled batch join (there is no per-query "impatience"
//! knob here; lookup batches are always joined all-settled).

use std::time::Duration;

/// Kademlia's replication parameter: maximum contacts held per bucket.
pub const DEFAULT_K: usize = 20;
/// Concurrency factor for iterative lookups.
pub const DEFAULT_ALPHA: usize = 3;
/// Default ceiling a transport is asked to honor on a single RPC.
pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunable network-wide constants for a routing table / router pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub k: usize,
    pub alpha: usize,
    pub network_timeout: Duration,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            k: DEFAULT_K,
            alpha: DEFAULT_ALPHA,
            network_timeout: DEFAULT_NETWORK_TIMEOUT,
        }
    }
}

/// Builder for [`Configuration`].
#[derive(Debug, Clone, Default)]
pub struct Factory {
    configuration: Configuration,
}

impl Factory {
    pub fn new() -> Self {
        Factory::default()
    }

    pub fn build(&self) -> Configuration {
        self.configuration.clone()
    }

    /// Data structure factor: maximum contacts per bucket (Kademlia's `K`).
    pub fn k_factor(mut self, k: usize) -> Self {
        self.configuration.k = k;
        self
    }

    /// Lookup concurrency factor (Kademlia's `ALPHA`).
    pub fn alpha(mut self, alpha: usize) -> Self {
        self.configuration.alpha = alpha;
        self
    }

    /// Ceiling a transport is asked to honor on a single outbound RPC.
    pub fn network_timeout(mut self, timeout: Duration) -> Self {
        self.configuration.network_timeout = timeout;
        self
    }
}
