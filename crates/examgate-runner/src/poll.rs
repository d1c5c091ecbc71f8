//! Bounded polling for asynchronous execution results.

use std::time::Duration;

use examgate_core::error::ConfigurationError;

const DEFAULT_INTERVAL_MS: u64 = 500;
const DEFAULT_MAX_POLLS: u32 = 20;
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// How long and how often to wait for a submitted program to finish.
///
/// `timeout` bounds the whole submit-and-poll operation, independently of
/// `max_polls`; whichever runs out first ends the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_polls: u32,
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_polls: u32, timeout: Duration) -> Result<Self, ConfigurationError> {
        if max_polls == 0 {
            return Err(ConfigurationError::InvalidSetting {
                name: "max_polls",
                message: "must be at least 1".into(),
            });
        }
        if timeout.is_zero() {
            return Err(ConfigurationError::InvalidSetting {
                name: "timeout",
                message: "must be positive".into(),
            });
        }
        Ok(Self {
            interval,
            max_polls,
            timeout,
        })
    }

    /// Delay before poll number `poll` (zero-based). The first poll is immediate.
    pub fn delay_before(&self, poll: u32) -> Duration {
        if poll == 0 {
            Duration::ZERO
        } else {
            self.interval
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            max_polls: DEFAULT_MAX_POLLS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}
