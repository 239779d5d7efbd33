use meshsync_shared::{ChangeRecord, NodeId};

/// A creation record for a node with one `name` property
pub fn create_node(name: &str) -> ChangeRecord {
    ChangeRecord::NodeCreated {
        node: NodeId::from(name),
        properties: vec![("name".to_string(), name.to_string())],
        types: Vec::new(),
    }
}

pub fn set_property(node: &str, property: &str, value: &str) -> ChangeRecord {
    ChangeRecord::PropertySet {
        node: NodeId::from(node),
        property: property.to_string(),
        value: value.to_string(),
    }
}
