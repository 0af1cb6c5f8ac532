//! Retry policy for provider calls
//!
//! The scheduler keeps one [`RetryState`] per provider call and asks it,
//! after each failure, whether and when the next attempt may run.

use crate::error::ProviderError;
use std::time::Duration;
use tokio::time::Instant;

/// Retry configuration for provider operations
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let factor = self.backoff_multiplier.max(1.0).powi(exponent);
        let delay = self.initial_delay.as_secs_f64() * factor;
        if !delay.is_finite() || delay >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(delay)
        }
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again once the instant has passed
    RetryAt(Instant),
    /// Stop and report the failure
    GiveUp,
}

/// Retry bookkeeping of one provider call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    /// Attempts made so far
    pub attempt: u32,

    /// Earliest time the next attempt may start
    pub next_eligible_at: Option<Instant>,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of an attempt
    pub fn begin_attempt(&mut self) {
        self.attempt += 1;
        self.next_eligible_at = None;
    }

    /// Record a failed attempt
    pub fn on_failure(
        &mut self,
        config: &RetryConfig,
        error: &ProviderError,
        now: Instant,
    ) -> RetryDecision {
        if !error.is_retryable() || self.attempt >= config.max_attempts {
            return RetryDecision::GiveUp;
        }
        let at = now + config.delay_after(self.attempt);
        self.next_eligible_at = Some(at);
        RetryDecision::RetryAt(at)
    }
}
