/// End-to-end replication between two mesh bases: local changes flow to
/// the partner's store, acknowledgments clear retained messages, and both
/// directions work at once.
use std::time::Instant;

use meshsync_base::GraphStore;
use meshsync_shared::{CoherencePolicy, NodeId};
use meshsync_test::{create_node, set_property, ProxyPair};

#[test]
fn changes_replicate_in_both_directions() {
    let mut pair = ProxyPair::new(CoherencePolicy::push_immediate());
    let now = Instant::now();

    pair.a
        .send_changes(vec![create_node("left"), set_property("left", "name", "L")])
        .unwrap();
    pair.b.send_changes(vec![create_node("right")]).unwrap();

    let (report_a, report_b) = pair.pump(&now, 1_000);

    assert_eq!(report_b.applied, 2);
    assert_eq!(report_a.applied, 1);
    assert!(pair.store_b.snapshot(&NodeId::from("left")).is_some());
    assert!(pair.store_a.snapshot(&NodeId::from("right")).is_some());
}

#[test]
fn acknowledgment_clears_the_retained_batch() {
    let mut pair = ProxyPair::new(CoherencePolicy::push_immediate());
    let now = Instant::now();

    pair.a.send_changes(vec![create_node("x")]).unwrap();
    pair.pump(&now, 1_000);

    let external = pair.a.externalize().unwrap();
    assert_eq!(external.last_sent_token, 1);
    // b's reply carried an acknowledging token, so nothing is retained
    assert!(external.unacknowledged.is_empty());
}

#[test]
fn transmit_failure_retries_with_the_same_token_after_recovery() {
    let mut pair = ProxyPair::new(CoherencePolicy::push_immediate());
    let now = Instant::now();

    pair.a_to_b.break_link();
    pair.a.send_changes(vec![create_node("x")]).unwrap();
    let _ = pair.a.send_outgoing(&now);

    pair.a_to_b.restore_link();
    let (_, report_b) = pair.pump(&now, 1_000);

    assert_eq!(report_b.applied, 1);
    assert_eq!(pair.a.externalize().unwrap().last_sent_token, 1);
    assert!(pair.store_b.snapshot(&NodeId::from("x")).is_some());
}

#[test]
fn sustained_link_failure_kills_the_endpoint() {
    let mut pair = ProxyPair::new(CoherencePolicy::push_immediate());
    let now = Instant::now();

    pair.a_to_b.break_link();
    pair.a.send_changes(vec![create_node("x")]).unwrap();

    // retry budget of three, then the endpoint declares itself dead
    for _ in 0..3 {
        let _ = pair.a.send_outgoing(&now);
    }
    assert!(pair.a.send_outgoing(&now).is_err());
    assert!(!pair.a.is_live());
}

#[test]
fn cease_tells_the_partner_to_forget_the_relationship() {
    let mut pair = ProxyPair::new(CoherencePolicy::push_immediate());
    let now = Instant::now();

    pair.a.die(true).unwrap();
    let _ = pair.a.send_outgoing(&now);
    let report = pair
        .b
        .process_incoming(&mut pair.store_b, 1_000)
        .unwrap();

    assert!(report.ceased);
    assert!(!pair.b.is_live());
}
