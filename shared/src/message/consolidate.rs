use std::collections::HashSet;

use crate::message::change::{ChangeRecord, PropertyName};
use crate::types::NodeId;

/// Compacts a change-record sequence by dropping property sets that are
/// superseded by a later set of the same (node, property). Creations,
/// deletions, type and role changes are never merged across.
///
/// This is an optional optimization: the result is final-state equivalent
/// to the input, but not byte-identical. Callers that require verbatim
/// replay (resend paths) must not consolidate.
pub fn consolidate(records: Vec<ChangeRecord>) -> Vec<ChangeRecord> {
    let mut superseded: HashSet<(NodeId, PropertyName)> = HashSet::new();
    let mut kept_reversed: Vec<ChangeRecord> = Vec::with_capacity(records.len());

    // Walk backward: the last write to each (node, property) wins. A node
    // lifecycle record invalidates everything known about that node, so
    // earlier property sets must survive untouched.
    for record in records.into_iter().rev() {
        match &record {
            ChangeRecord::PropertySet { node, property, .. } => {
                let key = (node.clone(), property.clone());
                if superseded.contains(&key) {
                    continue;
                }
                superseded.insert(key);
            }
            ChangeRecord::NodeCreated { node, .. } | ChangeRecord::NodeDeleted { node } => {
                let node = node.clone();
                superseded.retain(|(n, _)| *n != node);
            }
            _ => {}
        }
        kept_reversed.push(record);
    }

    kept_reversed.reverse();
    kept_reversed
}
