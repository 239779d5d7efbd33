/// Restart recovery: a proxy restored from externalized state resends its
/// unacknowledged batch verbatim, and the partner's duplicate suppression
/// decides whether it applies.
///
/// Scenario: before the restart, "create node x" went out with send token
/// 5 but no acknowledging token ever came back. After the restart the
/// batch goes out again with token 5. A partner that had processed token
/// 5 drops it; a partner that had only processed token 4 applies it once.
use std::sync::Arc;
use std::time::Instant;

use meshsync_base::{AllowAll, ExternalizedProxy, GraphStore, MemoryGraph, Proxy};
use meshsync_shared::{BaseId, DeltaMessage, NodeId};
use meshsync_test::{create_node, flaky_channel, test_endpoint_config};

fn externalized_sender_with_unacked_create() -> ExternalizedProxy {
    let mut retained = DeltaMessage::with_changes(
        BaseId::from("mesh://a"),
        BaseId::from("mesh://b"),
        vec![create_node("x")],
    );
    retained.token = 5;
    retained.ack_token = 4;

    ExternalizedProxy {
        local_id: BaseId::from("mesh://a"),
        partner_id: BaseId::from("mesh://b"),
        coherence: "push".to_string(),
        last_sent_token: 5,
        last_received_token: 4,
        unacknowledged: vec![(5, retained)],
        queued: Vec::new(),
        time_created: 1_000,
        time_updated: 5_000,
        time_read: 4_000,
        time_expires: 0,
        snapshot_taken: false,
    }
}

fn externalized_receiver(last_received_token: u64) -> ExternalizedProxy {
    ExternalizedProxy {
        local_id: BaseId::from("mesh://b"),
        partner_id: BaseId::from("mesh://a"),
        coherence: "push".to_string(),
        last_sent_token: 4,
        last_received_token,
        unacknowledged: Vec::new(),
        queued: Vec::new(),
        time_created: 1_000,
        time_updated: 5_000,
        time_read: 4_000,
        time_expires: 0,
        snapshot_taken: false,
    }
}

fn restored_pair(receiver_last_received: u64) -> (Proxy, Proxy) {
    let (to_b, from_a, _ab) = flaky_channel();
    let (to_a, from_b, _ba) = flaky_channel();
    let a = Proxy::restore(
        externalized_sender_with_unacked_create(),
        Arc::new(AllowAll),
        to_b,
        from_b,
        test_endpoint_config(),
    )
    .unwrap();
    let b = Proxy::restore(
        externalized_receiver(receiver_last_received),
        Arc::new(AllowAll),
        to_a,
        from_a,
        test_endpoint_config(),
    )
    .unwrap();
    (a, b)
}

#[test]
fn partner_that_missed_the_batch_applies_it_once() {
    let (a, b) = restored_pair(4);
    let mut store = MemoryGraph::new();
    let now = Instant::now();

    a.send_outgoing(&now).unwrap();
    let report = b.process_incoming(&mut store, 6_000).unwrap();

    assert_eq!(report.applied, 1);
    assert!(store.snapshot(&NodeId::from("x")).is_some());
    // no new token was consumed by the resend
    assert_eq!(a.externalize().unwrap().last_sent_token, 5);
}

#[test]
fn partner_that_already_processed_the_batch_drops_it() {
    let (a, b) = restored_pair(5);
    let mut store = MemoryGraph::new();
    let now = Instant::now();

    a.send_outgoing(&now).unwrap();
    let report = b.process_incoming(&mut store, 6_000).unwrap();

    assert_eq!(report.applied, 0);
    assert!(store.snapshot(&NodeId::from("x")).is_none());
}

#[test]
fn json_round_trip_then_restore_still_resends_verbatim() {
    let encoded = externalized_sender_with_unacked_create().to_json().unwrap();
    let decoded = ExternalizedProxy::from_json(&encoded).unwrap();

    let (to_b, from_a, _ab) = flaky_channel();
    let (_to_a, from_b, _ba) = flaky_channel();
    let a = Proxy::restore(
        decoded,
        Arc::new(AllowAll),
        to_b,
        from_b,
        test_endpoint_config(),
    )
    .unwrap();
    let now = Instant::now();
    a.send_outgoing(&now).unwrap();

    let mut from_a = from_a;
    let resent = from_a.receive().unwrap().unwrap();
    assert_eq!(resent.token, 5);
    assert_eq!(resent.changes, vec![create_node("x")]);
}
