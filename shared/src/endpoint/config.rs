use std::time::Duration;

use crate::backoff::RetryConfig;

/// Timing and retry parameters of an Endpoint. Passed in at construction;
/// immutable afterwards.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// How long the endpoint stays quiet before sending an empty
    /// (token-only) heartbeat message
    pub heartbeat_interval: Duration,
    /// How long to wait for an acknowledging token before resending the
    /// retained batch verbatim (the partner may never have received it)
    pub recover_interval: Duration,
    /// Retry policy for failed transmits
    pub retry: RetryConfig,
    /// Random variation fraction applied to protocol time constants, so
    /// two endpoints never fall into lockstep timing
    pub random_variation: f32,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(4),
            recover_interval: Duration::from_secs(10),
            retry: RetryConfig::default(),
            random_variation: 0.1,
        }
    }
}
