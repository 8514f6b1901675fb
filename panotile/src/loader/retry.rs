//! Retry policy for resource fetches.
//!
//! A fetch that fails with a transient error is retried according to a
//! [`RetryPolicy`]. Once the policy runs out of attempts the failure is
//! permanent for that request; the next request for the same resource starts
//! over with a fresh budget.

use std::time::Duration;

/// Default step for linearly increasing retry delays (1 second).
pub const DEFAULT_RETRY_STEP_MS: u64 = 1000;

/// Default initial delay for exponential backoff (100ms).
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 100;

/// Default maximum delay for exponential backoff (30 seconds).
pub const DEFAULT_MAX_DELAY_SECS: u64 = 30;

/// How a fetch handles transient failures.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum RetryPolicy {
    /// No retries - fail immediately on error.
    #[default]
    None,

    /// Constant delay between attempts.
    Fixed {
        /// Maximum number of attempts (including the initial attempt).
        max_attempts: u32,
        /// Delay between retry attempts.
        delay: Duration,
    },

    /// Delay grows by `step` with every retry: `step`, `2 * step`, ...
    Linear {
        /// Maximum number of attempts (including the initial attempt).
        max_attempts: u32,
        /// Increment added to the delay for each retry.
        step: Duration,
    },

    /// Delay is multiplied by `multiplier` after each failure, up to `max_delay`.
    ExponentialBackoff {
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    },
}

impl RetryPolicy {
    /// Linear policy allowing `max_retries` retries after the first attempt,
    /// with the default 1 second step.
    pub fn linear(max_retries: u32) -> Self {
        Self::linear_with_step(max_retries, Duration::from_millis(DEFAULT_RETRY_STEP_MS))
    }

    /// Linear policy with a custom step.
    ///
    /// Zero retries collapses to [`RetryPolicy::None`].
    pub fn linear_with_step(max_retries: u32, step: Duration) -> Self {
        if max_retries == 0 {
            return Self::None;
        }
        Self::Linear {
            max_attempts: max_retries + 1,
            step,
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::Fixed { max_attempts, delay }
    }

    pub fn exponential(max_attempts: u32) -> Self {
        Self::ExponentialBackoff {
            max_attempts,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            multiplier: 2.0,
        }
    }

    /// Calculates the delay before a given retry.
    ///
    /// # Arguments
    ///
    /// * `attempt` - The retry number (1-based, where 1 is the first retry)
    ///
    /// # Returns
    ///
    /// The delay to wait before the retry, or `None` if no more retries are allowed.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts() {
            return None;
        }
        match self {
            Self::None => None,
            Self::Fixed { delay, .. } => Some(*delay),
            Self::Linear { step, .. } => Some(*step * attempt),
            Self::ExponentialBackoff {
                initial_delay,
                max_delay,
                multiplier,
                ..
            } => {
                let factor = multiplier.powi(attempt as i32 - 1);
                let delay_ms = (initial_delay.as_millis() as f64 * factor)
                    .min(max_delay.as_millis() as f64);
                Some(Duration::from_millis(delay_ms as u64))
            }
        }
    }

    /// Returns the maximum number of attempts for this policy.
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::Fixed { max_attempts, .. }
            | Self::Linear { max_attempts, .. }
            | Self::ExponentialBackoff { max_attempts, .. } => *max_attempts,
        }
    }
}
