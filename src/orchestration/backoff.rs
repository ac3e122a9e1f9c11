//! Exponential backoff for jobs waiting on an unfinished dependency.

use std::time::Duration;

use crate::config::BackoffConfig;
use crate::constants;

/// Per-job backoff state
#[derive(Debug, Clone)]
pub struct DependencyBackoff {
    config: BackoffConfig,
    attempts: u32,
}

impl DependencyBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Number of delays handed out so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Next delay, growing by `multiplier` per attempt and capped at
    /// `max_delay_ms`. Returns `None` once `max_attempts` delays were issued.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max_attempts) = self.config.max_attempts {
            if self.attempts >= max_attempts {
                return None;
            }
        }

        let max_ms = self.config.max_delay_ms as f64;
        let exponent = self.attempts.min(64) as i32;
        let mut delay_ms =
            (self.config.initial_delay_ms as f64 * self.config.multiplier.powi(exponent)).min(max_ms);

        if self.config.jitter {
            let jitter = fastrand::f64() * constants::backoff::JITTER_MAX_PERCENTAGE;
            delay_ms = (delay_ms * (1.0 + jitter)).min(max_ms);
        }

        self.attempts = self.attempts.saturating_add(1);
        Some(Duration::from_millis(delay_ms as u64))
    }
}
