/// Single-flight guarantees under contention: N threads asking for the
/// same new proxy or shadow get one instance, and the shadow's first
/// population runs one fetch no matter how many callers arrive at once.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use meshsync_base::{AllowAll, Proxy, ProxyDirectory};
use meshsync_probe::{
    ContentParser, FetchError, ParseError, PassiveProbeManager, ProbeRegistry, RawContent,
    SourceFetcher, SourceId,
};
use meshsync_shared::{BaseId, ChangeRecord, CoherencePolicy, NodeId, RetryConfig};
use meshsync_test::{flaky_channel, test_endpoint_config};

struct SlowCountingFetcher {
    fetches: Arc<AtomicUsize>,
}

impl SourceFetcher for SlowCountingFetcher {
    fn supports(&self, _source: &SourceId) -> bool {
        true
    }

    fn fetch(&self, _source: &SourceId) -> Result<RawContent, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        // widen the race window
        thread::sleep(Duration::from_millis(30));
        Ok(RawContent::of(b"node".to_vec()))
    }
}

struct OneNodeParser;

impl ContentParser for OneNodeParser {
    fn parse(&self, _content: &RawContent) -> Result<Vec<ChangeRecord>, ParseError> {
        Ok(vec![ChangeRecord::NodeCreated {
            node: NodeId::from("n"),
            properties: Vec::new(),
            types: Vec::new(),
        }])
    }
}

#[test]
fn concurrent_obtains_share_one_shadow_and_one_fetch() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let registry = ProbeRegistry::new().register(
        Arc::new(SlowCountingFetcher {
            fetches: fetches.clone(),
        }),
        Arc::new(OneNodeParser),
    );
    let manager = Arc::new(PassiveProbeManager::new(registry, RetryConfig::default()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            thread::spawn(move || {
                manager
                    .obtain_for(
                        &SourceId::from("test://contended"),
                        CoherencePolicy::poll_at_interval(Duration::from_secs(60)),
                        1_000,
                    )
                    .unwrap()
            })
        })
        .collect();

    let shadows: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(fetches.load(Ordering::SeqCst), 1);
    assert!(shadows
        .windows(2)
        .all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert!(shadows[0].snapshot(&NodeId::from("n")).unwrap().is_some());
}

#[test]
fn concurrent_proxy_obtains_share_one_proxy() {
    let created = Arc::new(AtomicUsize::new(0));
    let directory = Arc::new(ProxyDirectory::new(BaseId::from("mesh://here")));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let directory = directory.clone();
            let created = created.clone();
            thread::spawn(move || {
                directory
                    .obtain_for(&BaseId::from("mesh://there"), || {
                        created.fetch_add(1, Ordering::SeqCst);
                        let (sender, _discard, _) = flaky_channel();
                        let (_unused, receiver, _) = flaky_channel();
                        Ok(Proxy::new(
                            BaseId::from("mesh://here"),
                            BaseId::from("mesh://there"),
                            CoherencePolicy::push_immediate(),
                            Arc::new(AllowAll),
                            sender,
                            receiver,
                            test_endpoint_config(),
                        ))
                    })
                    .unwrap()
            })
        })
        .collect();

    let proxies: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(directory.len(), 1);
    assert!(proxies
        .windows(2)
        .all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
}
