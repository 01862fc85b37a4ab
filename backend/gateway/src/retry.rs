//! Retry policy for transient agent failures.
//!
//! The handler retries a call at most once, and only when the agent adapter
//! reports a transport-level failure. Explicit upstream errors, timeouts and
//! parsing failures are never retried.

use std::time::Duration;

/// Attempts per request, the first call included.
pub const MAX_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Wait before the single retry.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { delay: Duration::from_millis(250) }
    }
}

impl RetryPolicy {
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }

    /// Whether another attempt is allowed after `attempt_number` attempts.
    pub fn should_retry(&self, attempt_number: u32) -> bool {
        attempt_number < MAX_ATTEMPTS
    }
}
