//! Room configuration.

use std::time::Duration;

/// Catch-up payload and in-memory cache cap, in events.
pub const HISTORY_LIMIT: usize = 100;

/// Tuning for a room actor instance.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Newest events kept in memory and replayed to a fresh session.
    pub history_limit: usize,

    /// Events older than this are pruned from storage.
    pub retention_max_age: Duration,

    /// How often the retention pass runs. The first tick per actor is
    /// jittered within one period so rooms created together don't all
    /// prune at once.
    pub retention_interval: Duration,

    /// An actor with no commands for this long evicts itself. Session
    /// identity survives in the connection registry.
    pub idle_timeout: Duration,

    /// Command channel capacity (bounded, for backpressure).
    pub channel_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            history_limit: HISTORY_LIMIT,
            retention_max_age: Duration::from_secs(24 * 60 * 60),
            retention_interval: Duration::from_secs(60 * 60),
            idle_timeout: Duration::from_secs(10 * 60),
            channel_size: 64,
        }
    }
}

impl RoomConfig {
    /// Clamps nonsense values to workable ones.
    pub fn validated(mut self) -> Self {
        if self.history_limit == 0 {
            self.history_limit = 1;
        }
        if self.channel_size == 0 {
            self.channel_size = 1;
        }
        if self.retention_interval.is_zero() {
            self.retention_interval = Duration::from_secs(1);
        }
        if self.idle_timeout.is_zero() {
            self.idle_timeout = Duration::from_millis(1);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_service_constants() {
        let config = RoomConfig::default();
        assert_eq!(config.history_limit, 100);
        assert_eq!(config.retention_max_age, Duration::from_secs(86_400));
        assert_eq!(config.retention_interval, Duration::from_secs(3_600));
    }

    #[test]
    fn test_validated_clamps_zeroes() {
        let config = RoomConfig {
            history_limit: 0,
            channel_size: 0,
            retention_interval: Duration::ZERO,
            idle_timeout: Duration::ZERO,
            ..RoomConfig::default()
        }
        .validated();
        assert_eq!(config.history_limit, 1);
        assert_eq!(config.channel_size, 1);
        assert!(!config.retention_interval.is_zero());
        assert!(!config.idle_timeout.is_zero());
    }
}
