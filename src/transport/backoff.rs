//! Bounded exponential backoff for reconnect scheduling.

use std::time::Duration;

/// Reconnect limits for one connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Reconnect attempts allowed after the socket drops. The initial
    /// connection does not count.
    pub max_attempts: u32,
    /// Delay before the first reconnect. Also the floor the delay resets to
    /// after a successful open.
    pub base_delay: Duration,
    /// Ceiling for the doubled delay.
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
        }
    }
}

/// Attempt counter and current delay for one connection.
#[derive(Debug)]
pub(crate) struct Backoff {
    policy: ReconnectPolicy,
    attempts: u32,
    delay: Duration,
}

impl Backoff {
    pub(crate) fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempts: 0, delay: policy.base_delay }
    }

    /// Back to zero attempts and the floor delay.
    pub(crate) fn reset(&mut self) {
        self.attempts = 0;
        self.delay = self.policy.base_delay;
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Count one more attempt and return how long to wait before it, or
    /// `None` once the attempt ceiling is exceeded.
    pub(crate) fn next_delay(&mut self) -> Option<Duration> {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts > self.policy.max_attempts {
            return None;
        }
        let delay = self.delay.min(self.policy.max_delay);
        self.delay = self.delay.saturating_mul(2).min(self.policy.max_delay);
        Some(delay)
    }
}

#[cfg(test)]
#[path = "backoff_test.rs"]
mod tests;
