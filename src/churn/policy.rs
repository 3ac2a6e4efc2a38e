use crate::config::Config;
use std::time::Duration;

/// Pause between two churn iterations
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

/// Consecutive failed iterations after which churn gives up
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// How many times to churn, how long to wait in between, and when to quit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total iterations to run
    pub attempts: u32,

    /// Constant pause after every iteration except the last
    pub backoff: Duration,

    /// Consecutive failures that abort the controller; 0 never aborts
    pub failure_threshold: u32,
}

impl RetryPolicy {
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts,
            backoff: DEFAULT_BACKOFF,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.churn_attempts())
    }

    /// Pause to take after iteration `iteration` (zero-based)
    ///
    /// Returns `None` after the final iteration.
    pub fn backoff_after(&self, iteration: u32) -> Option<Duration> {
        if iteration.saturating_add(1) < self.attempts {
            Some(self.backoff)
        } else {
            None
        }
    }

    /// Whether `consecutive_failures` is enough to give up
    pub fn should_abort(&self, consecutive_failures: u32) -> bool {
        self.failure_threshold > 0 && consecutive_failures >= self.failure_threshold
    }
}
