use thiserror::Error;

use meshsync_shared::{ChangeRecord, NodeId, PropertyName, PropertyValue, RoleName, TypeName};

/// Errors that can occur applying a change record to a graph store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The change refers to a node this store does not hold
    #[error("Node {node} does not exist")]
    NodeNotFound { node: NodeId },

    /// A creation record collides with an existing, different node
    #[error("Node {node} already exists with different content")]
    NodeAlreadyExists { node: NodeId },
}

/// Result of applying a change record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The store content changed
    Changed,
    /// The change was already reflected; applying it again was a no-op
    NoOp,
}

/// Point-in-time copy of one node's content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub node: NodeId,
    pub properties: Vec<(PropertyName, PropertyValue)>,
    pub types: Vec<TypeName>,
    pub roles: Vec<(RoleName, NodeId)>,
    /// Whether the local copy is the node's master (authoritative) copy
    pub authoritative: bool,
}

/// The graph storage seam. The storage engine itself is external; the
/// replication layer only needs idempotent change application, snapshots,
/// and per-node authority tracking.
///
/// `apply_change` must be idempotent: applying a change that is already
/// reflected returns `Applied::NoOp` and leaves the store untouched.
pub trait GraphStore: Send {
    fn apply_change(&mut self, change: &ChangeRecord) -> Result<Applied, GraphError>;

    fn snapshot(&self, node: &NodeId) -> Option<NodeSnapshot>;

    fn node_ids(&self) -> Vec<NodeId>;

    /// Whether the local copy of `node` is authoritative (the master).
    /// Replicas are never authoritative unless explicitly promoted.
    fn is_authoritative(&self, node: &NodeId) -> bool;

    /// Promotes the local copy of `node` to authoritative
    fn promote(&mut self, node: &NodeId) -> Result<(), GraphError>;
}
