//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the mutation coordinator. Callers may override the
/// reservation wait per request; these are the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// How long an ALTER on an encoded-storage entity waits behind another
    /// in-flight qualifier reservation before aborting with a conflict.
    /// Waits are always bounded; there is no unbounded blocking.
    pub reservation_wait_ms: u64,

    /// Poll interval while waiting on a held reservation.
    pub reservation_poll_ms: u64,

    /// Upper bound on descendant-scan size for a single DROP cascade.
    pub max_cascade_entities: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            reservation_wait_ms: 2_000,
            reservation_poll_ms: 10,
            max_cascade_entities: 10_000,
        }
    }
}

impl CatalogConfig {
    pub fn reservation_wait(&self) -> Duration {
        Duration::from_millis(self.reservation_wait_ms)
    }

    pub fn reservation_poll(&self) -> Duration {
        Duration::from_millis(self.reservation_poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CatalogConfig::default();
        assert_eq!(config.reservation_wait(), Duration::from_millis(2_000));
        assert!(config.reservation_poll() < config.reservation_wait());
    }

    #[test]
    fn test_serde_round_trip() {
        let config = CatalogConfig {
            reservation_wait_ms: 500,
            reservation_poll_ms: 5,
            max_cascade_entities: 99,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: CatalogConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
