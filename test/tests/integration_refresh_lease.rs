/// Freshness behavior under each coherence mode: the poll lease drives
/// refresh no earlier and no later than the policy interval, on-demand
/// refresh blocks for its confirmation, and a timed-out invoke consumes
/// no token.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use meshsync_base::{MemoryGraph, Proxy, RefreshOutcome};
use meshsync_shared::CoherencePolicy;
use meshsync_test::ProxyPair;

#[test]
fn push_policy_never_asks_for_a_refresh() {
    let pair = ProxyPair::new(CoherencePolicy::push_immediate());
    assert_eq!(
        pair.a.refresh_if_needed(1_000, Duration::ZERO).unwrap(),
        RefreshOutcome::Fresh
    );
}

#[test]
fn poll_lease_expires_exactly_at_the_interval() {
    let mut pair = ProxyPair::new(CoherencePolicy::poll_at_interval(Duration::from_secs(60)));
    let now = Instant::now();

    assert_eq!(
        pair.a.refresh_if_needed(1_000, Duration::ZERO).unwrap(),
        RefreshOutcome::Requested
    );
    pair.pump(&now, 2_000);
    assert_eq!(pair.a.time_expires().unwrap(), 62_000);

    // not a millisecond early
    assert_eq!(
        pair.a.refresh_if_needed(61_999, Duration::ZERO).unwrap(),
        RefreshOutcome::Fresh
    );
    // and not a millisecond late
    assert_eq!(
        pair.a.refresh_if_needed(62_000, Duration::ZERO).unwrap(),
        RefreshOutcome::Requested
    );
}

#[test]
fn on_demand_refresh_blocks_until_the_pong_arrives() {
    let pair = ProxyPair::new(CoherencePolicy::on_demand_only());
    let a = pair.a.clone();
    let b = pair.b.clone();
    let store_a = Arc::new(Mutex::new(MemoryGraph::new()));
    let store_b = Arc::new(Mutex::new(MemoryGraph::new()));
    let stop = Arc::new(AtomicBool::new(false));

    // background driver standing in for the delivery loop
    let driver = {
        let (a, b, stop) = (a.clone(), b.clone(), stop.clone());
        let (store_a, store_b) = (store_a.clone(), store_b.clone());
        thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                let now = Instant::now();
                let _ = a.send_outgoing(&now);
                let _ = b.process_incoming(&mut *store_b.lock().unwrap(), 1_000);
                let _ = b.send_outgoing(&now);
                let _ = a.process_incoming(&mut *store_a.lock().unwrap(), 2_000);
                thread::sleep(Duration::from_millis(5));
            }
        })
    };

    let outcome = a.refresh_if_needed(1_000, Duration::from_secs(5)).unwrap();
    assert_eq!(outcome, RefreshOutcome::Confirmed);
    assert_eq!(a.time_read().unwrap(), 2_000);

    stop.store(true, Ordering::SeqCst);
    driver.join().unwrap();
}

#[test]
fn one_time_snapshot_confirms_once_then_stays_fresh() {
    let pair = ProxyPair::new(CoherencePolicy::one_time_snapshot());
    let a = pair.a.clone();
    let b = pair.b.clone();
    let store_a = Arc::new(Mutex::new(MemoryGraph::new()));
    let store_b = Arc::new(Mutex::new(MemoryGraph::new()));
    let stop = Arc::new(AtomicBool::new(false));

    let driver = {
        let (a, b, stop) = (a.clone(), b.clone(), stop.clone());
        let (store_a, store_b) = (store_a.clone(), store_b.clone());
        thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                let now = Instant::now();
                let _ = a.send_outgoing(&now);
                let _ = b.process_incoming(&mut *store_b.lock().unwrap(), 1_000);
                let _ = b.send_outgoing(&now);
                let _ = a.process_incoming(&mut *store_a.lock().unwrap(), 2_000);
                thread::sleep(Duration::from_millis(5));
            }
        })
    };

    assert_eq!(
        a.refresh_if_needed(1_000, Duration::from_secs(5)).unwrap(),
        RefreshOutcome::Confirmed
    );
    assert_eq!(
        a.refresh_if_needed(9_000, Duration::from_secs(5)).unwrap(),
        RefreshOutcome::Fresh
    );

    stop.store(true, Ordering::SeqCst);
    driver.join().unwrap();
}

#[test]
fn timed_out_invoke_consumes_no_token_and_keeps_the_lease() {
    // nobody drives the message loop, so the invoke must time out
    let pair = ProxyPair::new(CoherencePolicy::on_demand_only());
    let a: Arc<Proxy> = pair.a.clone();

    let before = a.externalize().unwrap();
    let result = a.refresh_if_needed(1_000, Duration::from_millis(20));
    assert!(result.is_err());

    let after = a.externalize().unwrap();
    assert_eq!(after.last_sent_token, before.last_sent_token);
    assert_eq!(after.last_received_token, before.last_received_token);
    assert_eq!(after.time_expires, before.time_expires);
}
