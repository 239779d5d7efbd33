use std::time::Duration;

use crate::timer::vary;

/// Retry policy for failed transmits: exponentially growing delays, a cap,
/// and a bounded number of attempts before the endpoint is declared dead
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Failed attempts tolerated before giving up
    pub max_attempts: u32,
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt
    pub factor: f32,
    pub max_delay: Duration,
    /// Random variation fraction applied to each delay
    pub jitter: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            initial_delay: Duration::from_millis(200),
            factor: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: 0.1,
        }
    }
}

/// Tracks consecutive failed attempts against a RetryConfig. Reset on any
/// success.
pub struct Backoff {
    config: RetryConfig,
    attempts: u32,
}

impl Backoff {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Records one failed attempt. Returns how long to wait before the
    /// next one, or `None` once the attempt budget is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.config.max_attempts {
            return None;
        }
        let grown = self
            .config
            .initial_delay
            .mul_f32(self.config.factor.powi(self.attempts as i32));
        let capped = grown.min(self.config.max_delay);
        self.attempts += 1;
        Some(vary(capped, self.config.jitter))
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Failed attempts recorded since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn exhausted(&self) -> bool {
        self.attempts >= self.config.max_attempts
    }
}
