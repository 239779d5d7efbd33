use std::sync::Arc;
use std::time::{Duration, Instant};

use meshsync_base::{AllowAll, MemoryGraph, ProcessReport, Proxy};
use meshsync_shared::{BaseId, CoherencePolicy, EndpointConfig, RetryConfig, TimeMillis};

use crate::helpers::flaky_channel::{flaky_channel, FlakySwitch};

/// Deterministic endpoint timing for tests: no jitter, immediate retries,
/// long heartbeat so it never interferes
pub fn test_endpoint_config() -> EndpointConfig {
    EndpointConfig {
        heartbeat_interval: Duration::from_secs(3600),
        recover_interval: Duration::from_secs(3600),
        retry: RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::ZERO,
            factor: 1.0,
            max_delay: Duration::ZERO,
            jitter: 0.0,
        },
        random_variation: 0.0,
    }
}

/// Two proxies wired back to back over breakable in-memory channels, each
/// with its own graph store
pub struct ProxyPair {
    pub a: Arc<Proxy>,
    pub b: Arc<Proxy>,
    pub store_a: MemoryGraph,
    pub store_b: MemoryGraph,
    pub a_to_b: FlakySwitch,
    pub b_to_a: FlakySwitch,
}

impl ProxyPair {
    pub fn new(policy: CoherencePolicy) -> Self {
        Self::with_config(policy, test_endpoint_config())
    }

    pub fn with_config(policy: CoherencePolicy, config: EndpointConfig) -> Self {
        let (to_b, from_a, a_to_b) = flaky_channel();
        let (to_a, from_b, b_to_a) = flaky_channel();
        let a = Arc::new(Proxy::new(
            BaseId::from("mesh://a"),
            BaseId::from("mesh://b"),
            policy,
            Arc::new(AllowAll),
            to_b,
            from_b,
            config.clone(),
        ));
        let b = Arc::new(Proxy::new(
            BaseId::from("mesh://b"),
            BaseId::from("mesh://a"),
            policy,
            Arc::new(AllowAll),
            to_a,
            from_a,
            config,
        ));
        Self {
            a,
            b,
            store_a: MemoryGraph::new(),
            store_b: MemoryGraph::new(),
            a_to_b,
            b_to_a,
        }
    }

    /// Drives one full exchange round: a sends and b processes, then b
    /// sends and a processes. Returns both process reports (a's first).
    pub fn pump(&mut self, now: &Instant, now_ms: TimeMillis) -> (ProcessReport, ProcessReport) {
        let _ = self.a.send_outgoing(now);
        let report_b = self
            .b
            .process_incoming(&mut self.store_b, now_ms)
            .expect("processing b's inbox");
        let _ = self.b.send_outgoing(now);
        let report_a = self
            .a
            .process_incoming(&mut self.store_a, now_ms)
            .expect("processing a's inbox");
        (report_a, report_b)
    }
}
