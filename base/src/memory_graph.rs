use std::collections::{BTreeMap, BTreeSet, HashMap};

use meshsync_shared::{ChangeRecord, NodeId, PropertyName, PropertyValue, RoleName, TypeName};

use crate::graph::{Applied, GraphError, GraphStore, NodeSnapshot};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct NodeRecord {
    properties: BTreeMap<PropertyName, PropertyValue>,
    types: BTreeSet<TypeName>,
    roles: BTreeSet<(RoleName, NodeId)>,
    authoritative: bool,
}

/// Reference in-memory graph store. Backs shadow mesh bases and tests;
/// production deployments plug their own engine in behind `GraphStore`.
#[derive(Default)]
pub struct MemoryGraph {
    nodes: HashMap<NodeId, NodeRecord>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a node whose master copy lives here (authoritative), as an
    /// application would when originating data locally
    pub fn create_local(
        &mut self,
        node: NodeId,
        properties: Vec<(PropertyName, PropertyValue)>,
        types: Vec<TypeName>,
    ) -> Result<(), GraphError> {
        if self.nodes.contains_key(&node) {
            return Err(GraphError::NodeAlreadyExists { node });
        }
        self.nodes.insert(
            node,
            NodeRecord {
                properties: properties.into_iter().collect(),
                types: types.into_iter().collect(),
                roles: BTreeSet::new(),
                authoritative: true,
            },
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Discards all content, replica and authoritative alike
    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

impl GraphStore for MemoryGraph {
    fn apply_change(&mut self, change: &ChangeRecord) -> Result<Applied, GraphError> {
        match change {
            ChangeRecord::NodeCreated {
                node,
                properties,
                types,
            } => {
                let incoming = NodeRecord {
                    properties: properties.iter().cloned().collect(),
                    types: types.iter().cloned().collect(),
                    roles: BTreeSet::new(),
                    authoritative: false,
                };
                match self.nodes.get(node) {
                    None => {
                        self.nodes.insert(node.clone(), incoming);
                        Ok(Applied::Changed)
                    }
                    Some(existing)
                        if existing.properties == incoming.properties
                            && existing.types == incoming.types =>
                    {
                        Ok(Applied::NoOp)
                    }
                    Some(_) => Err(GraphError::NodeAlreadyExists { node: node.clone() }),
                }
            }
            ChangeRecord::NodeDeleted { node } => match self.nodes.remove(node) {
                Some(_) => Ok(Applied::Changed),
                None => Ok(Applied::NoOp),
            },
            ChangeRecord::PropertySet {
                node,
                property,
                value,
            } => {
                let record = self
                    .nodes
                    .get_mut(node)
                    .ok_or_else(|| GraphError::NodeNotFound { node: node.clone() })?;
                if record.properties.get(property) == Some(value) {
                    return Ok(Applied::NoOp);
                }
                record.properties.insert(property.clone(), value.clone());
                Ok(Applied::Changed)
            }
            ChangeRecord::PropertyCleared { node, property } => {
                let record = self
                    .nodes
                    .get_mut(node)
                    .ok_or_else(|| GraphError::NodeNotFound { node: node.clone() })?;
                match record.properties.remove(property) {
                    Some(_) => Ok(Applied::Changed),
                    None => Ok(Applied::NoOp),
                }
            }
            ChangeRecord::TypeAdded { node, type_name } => {
                let record = self
                    .nodes
                    .get_mut(node)
                    .ok_or_else(|| GraphError::NodeNotFound { node: node.clone() })?;
                if record.types.insert(type_name.clone()) {
                    Ok(Applied::Changed)
                } else {
                    Ok(Applied::NoOp)
                }
            }
            ChangeRecord::TypeRemoved { node, type_name } => {
                let record = self
                    .nodes
                    .get_mut(node)
                    .ok_or_else(|| GraphError::NodeNotFound { node: node.clone() })?;
                if record.types.remove(type_name) {
                    Ok(Applied::Changed)
                } else {
                    Ok(Applied::NoOp)
                }
            }
            ChangeRecord::RoleAdded {
                node,
                role,
                neighbor,
            } => {
                let record = self
                    .nodes
                    .get_mut(node)
                    .ok_or_else(|| GraphError::NodeNotFound { node: node.clone() })?;
                if record.roles.insert((role.clone(), neighbor.clone())) {
                    Ok(Applied::Changed)
                } else {
                    Ok(Applied::NoOp)
                }
            }
            ChangeRecord::RoleRemoved {
                node,
                role,
                neighbor,
            } => {
                let record = self
                    .nodes
                    .get_mut(node)
                    .ok_or_else(|| GraphError::NodeNotFound { node: node.clone() })?;
                if record.roles.remove(&(role.clone(), neighbor.clone())) {
                    Ok(Applied::Changed)
                } else {
                    Ok(Applied::NoOp)
                }
            }
        }
    }

    fn snapshot(&self, node: &NodeId) -> Option<NodeSnapshot> {
        let record = self.nodes.get(node)?;
        Some(NodeSnapshot {
            node: node.clone(),
            properties: record.properties.clone().into_iter().collect(),
            types: record.types.clone().into_iter().collect(),
            roles: record.roles.clone().into_iter().collect(),
            authoritative: record.authoritative,
        })
    }

    fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().cloned().collect()
    }

    fn is_authoritative(&self, node: &NodeId) -> bool {
        self.nodes
            .get(node)
            .map(|record| record.authoritative)
            .unwrap_or(false)
    }

    fn promote(&mut self, node: &NodeId) -> Result<(), GraphError> {
        let record = self
            .nodes
            .get_mut(node)
            .ok_or_else(|| GraphError::NodeNotFound { node: node.clone() })?;
        record.authoritative = true;
        Ok(())
    }
}
