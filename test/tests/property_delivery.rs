/// PROPERTY-BASED TESTS: delivery invariants
///
/// Uses proptest to verify that the endpoint's duplicate suppression and
/// ordered release hold across random delivery schedules, and that
/// consolidation preserves last-write-wins semantics.
use proptest::prelude::*;

use meshsync_base::{GraphStore, MemoryGraph};
use meshsync_shared::{
    consolidate, BaseId, ChangeRecord, DeltaMessage, Endpoint, NodeId, PropertyValue,
};
use meshsync_test::{flaky_channel, test_endpoint_config};

fn receiving_endpoint() -> Endpoint {
    let (sender, _inbox, _switch) = flaky_channel();
    Endpoint::new(
        BaseId::from("mesh://a"),
        BaseId::from("mesh://b"),
        sender,
        test_endpoint_config(),
    )
}

fn message_with_token(token: u64) -> DeltaMessage {
    let mut message = DeltaMessage::with_changes(
        BaseId::from("mesh://b"),
        BaseId::from("mesh://a"),
        vec![ChangeRecord::PropertySet {
            node: NodeId::from("n"),
            property: "seq".to_string(),
            value: token.to_string(),
        }],
    );
    message.token = token;
    message
}

proptest! {
    /// However the schedule reorders and duplicates deliveries, every
    /// token is released exactly once and strictly in order
    #[test]
    fn prop_exactly_once_in_order_release(
        count in 1u64..16,
        schedule in prop::collection::vec(0u64..16, 0..48),
    ) {
        let mut endpoint = receiving_endpoint();
        let mut released = Vec::new();

        // random prefix with duplicates and gaps, then full coverage so
        // every token is eventually delivered at least once
        let deliveries = schedule
            .into_iter()
            .map(|index| index % count + 1)
            .chain(1..=count);

        for token in deliveries {
            for message in endpoint.receive(message_with_token(token)).unwrap() {
                released.push(message.token);
            }
        }

        let expected: Vec<u64> = (1..=count).collect();
        prop_assert_eq!(released, expected);
    }

    /// Applying duplicated, reordered deliveries through the endpoint
    /// leaves the store exactly as one clean in-order pass would
    #[test]
    fn prop_store_converges_despite_resends(
        count in 1u64..12,
        schedule in prop::collection::vec(0u64..12, 0..36),
    ) {
        let mut endpoint = receiving_endpoint();
        let mut store = MemoryGraph::new();
        store
            .apply_change(&ChangeRecord::NodeCreated {
                node: NodeId::from("n"),
                properties: Vec::new(),
                types: Vec::new(),
            })
            .unwrap();

        let deliveries = schedule
            .into_iter()
            .map(|index| index % count + 1)
            .chain(1..=count);

        for token in deliveries {
            for message in endpoint.receive(message_with_token(token)).unwrap() {
                for change in &message.changes {
                    store.apply_change(change).unwrap();
                }
            }
        }

        let snapshot = store.snapshot(&NodeId::from("n")).unwrap();
        let seq: Option<&(String, PropertyValue)> =
            snapshot.properties.iter().find(|(name, _)| name == "seq");
        let expected = count.to_string();
        prop_assert_eq!(seq.map(|(_, value)| value.as_str()), Some(expected.as_str()));
    }

    /// Consolidation keeps only the last write per (node, property) and
    /// never reorders surviving records
    #[test]
    fn prop_consolidation_is_last_write_wins(
        writes in prop::collection::vec((0u8..3, 0u8..3, 0u32..100), 1..32),
    ) {
        let changes: Vec<ChangeRecord> = writes
            .iter()
            .map(|(node, property, value)| ChangeRecord::PropertySet {
                node: NodeId::from(format!("n{node}").as_str()),
                property: format!("p{property}"),
                value: value.to_string(),
            })
            .collect();

        let consolidated = consolidate(changes.clone());

        // one survivor per touched (node, property), carrying the last value
        for (index, change) in changes.iter().enumerate() {
            let ChangeRecord::PropertySet { node, property, value } = change else {
                unreachable!()
            };
            let is_last = !changes[index + 1..].iter().any(|later| {
                matches!(later, ChangeRecord::PropertySet { node: n, property: p, .. }
                    if n == node && p == property)
            });
            let survivors = consolidated
                .iter()
                .filter(|kept| {
                    matches!(kept, ChangeRecord::PropertySet { node: n, property: p, .. }
                        if n == node && p == property)
                })
                .count();
            prop_assert_eq!(survivors, 1);
            if is_last {
                let last_write = ChangeRecord::PropertySet {
                    node: node.clone(),
                    property: property.clone(),
                    value: value.clone(),
                };
                prop_assert!(consolidated.contains(&last_write));
            }
        }
    }
}
