use serde::{Deserialize, Serialize};

use crate::types::NodeId;

/// Name of a node property
pub type PropertyName = String;

/// Property value carried by the protocol. The type/model system is
/// external; the replication layer treats values as opaque strings.
pub type PropertyValue = String;

/// Name of a node type
pub type TypeName = String;

/// Name of a typed relationship (role) between two nodes
pub type RoleName = String;

/// A single graph change conveyed by a DeltaMessage. Applying the same
/// record twice must not change the result; idempotency is the
/// responsibility of the graph store's apply path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeRecord {
    NodeCreated {
        node: NodeId,
        properties: Vec<(PropertyName, PropertyValue)>,
        types: Vec<TypeName>,
    },
    NodeDeleted {
        node: NodeId,
    },
    PropertySet {
        node: NodeId,
        property: PropertyName,
        value: PropertyValue,
    },
    PropertyCleared {
        node: NodeId,
        property: PropertyName,
    },
    TypeAdded {
        node: NodeId,
        type_name: TypeName,
    },
    TypeRemoved {
        node: NodeId,
        type_name: TypeName,
    },
    RoleAdded {
        node: NodeId,
        role: RoleName,
        neighbor: NodeId,
    },
    RoleRemoved {
        node: NodeId,
        role: RoleName,
        neighbor: NodeId,
    },
}

impl ChangeRecord {
    /// The node this change affects (for role changes, the node on whose
    /// side the role is recorded)
    pub fn node(&self) -> &NodeId {
        match self {
            ChangeRecord::NodeCreated { node, .. }
            | ChangeRecord::NodeDeleted { node }
            | ChangeRecord::PropertySet { node, .. }
            | ChangeRecord::PropertyCleared { node, .. }
            | ChangeRecord::TypeAdded { node, .. }
            | ChangeRecord::TypeRemoved { node, .. }
            | ChangeRecord::RoleAdded { node, .. }
            | ChangeRecord::RoleRemoved { node, .. } => node,
        }
    }
}
