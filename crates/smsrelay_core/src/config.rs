//! Log and relay configuration.

use crate::error::{RelayError, RelayResult};
use std::time::Duration;

/// Default number of notifications retained per device.
pub const DEFAULT_MAX_QUEUE_LENGTH: u64 = 1000;

/// Default long-poll wait.
pub const DEFAULT_LONG_POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a notification log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Maximum notifications kept per device.
    ///
    /// Applied when a device's queue is created; existing queues keep the
    /// limit they were created with.
    pub max_queue_length: u64,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_queue_length: DEFAULT_MAX_QUEUE_LENGTH,
        }
    }
}

impl LogConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-device queue limit.
    #[must_use]
    pub const fn max_queue_length(mut self, value: u64) -> Self {
        self.max_queue_length = value;
        self
    }

    /// Checks that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidConfig`] if `max_queue_length` is zero.
    pub fn validate(&self) -> RelayResult<()> {
        if self.max_queue_length == 0 {
            return Err(RelayError::invalid_config(
                "max_queue_length must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Configuration for a [`crate::NotificationRelay`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// How long a long-poll request waits before returning empty.
    pub long_poll_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            long_poll_timeout: DEFAULT_LONG_POLL_TIMEOUT,
        }
    }
}

impl RelayConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the long-poll timeout.
    #[must_use]
    pub const fn long_poll_timeout(mut self, value: Duration) -> Self {
        self.long_poll_timeout = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(LogConfig::default().max_queue_length, 1000);
        assert_eq!(
            RelayConfig::default().long_poll_timeout,
            Duration::from_secs(30)
        );
    }

    #[test]
    fn zero_queue_length_is_rejected() {
        let config = LogConfig::new().max_queue_length(0);
        assert!(matches!(
            config.validate(),
            Err(RelayError::InvalidConfig { .. })
        ));
        assert!(LogConfig::new().max_queue_length(1).validate().is_ok());
    }
}
