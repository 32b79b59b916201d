//! JSON documents describing a schema and a populated graph.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ModelError, ModelResult};
use crate::graph::ObjectGraph;
use crate::schema::{ModelType, Schema};
use crate::NodeId;

/// A serialized graph: its types and its nodes.
///
/// Relationship properties are written as node IDs: a number (or `null`) for
/// to-one relations, an array of numbers for to-many relations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub types: Vec<ModelType>,
    #[serde(default)]
    pub nodes: Vec<NodeDocument>,
}

/// One node of a [`GraphDocument`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDocument {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl GraphDocument {
    pub fn from_json(json: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn schema(&self) -> ModelResult<Schema> {
        let mut schema = Schema::new();
        for model_type in &self.types {
            schema.add(model_type.clone())?;
        }
        Ok(schema)
    }

    /// Build the graph. Nodes are created first so relationships may point forward.
    pub fn into_graph(self) -> ModelResult<ObjectGraph> {
        let mut graph = ObjectGraph::new(self.schema()?);

        for node in &self.nodes {
            graph.insert_node(node.id, &node.type_name)?;
        }

        for node in &self.nodes {
            for (name, value) in &node.properties {
                let def = graph.property(node.id, name)?.clone();
                if !def.is_relationship() {
                    graph.set_value(node.id, name, value.clone())?;
                } else if def.is_list() {
                    for target in node_ids(name, value)? {
                        graph.push(node.id, name, target)?;
                    }
                } else {
                    let target = match value {
                        Value::Null => None,
                        other => Some(node_id(name, other)?),
                    };
                    graph.set_reference(node.id, name, target)?;
                }
            }
        }

        Ok(graph)
    }
}

fn node_id(property: &str, value: &Value) -> ModelResult<NodeId> {
    value.as_u64().map(NodeId).ok_or_else(|| ModelError::TypeMismatch {
        property: property.to_string(),
        expected: "node id".to_string(),
        found: value.to_string(),
    })
}

fn node_ids(property: &str, value: &Value) -> ModelResult<Vec<NodeId>> {
    match value {
        Value::Array(items) => items.iter().map(|item| node_id(property, item)).collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(ModelError::TypeMismatch {
            property: property.to_string(),
            expected: "array of node ids".to_string(),
            found: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DOC: &str = r#"{
        "types": [
            { "name": "Order", "properties": [
                { "name": "Number" },
                { "name": "LineItems", "reference": "LineItem", "list": true }
            ] },
            { "name": "LineItem", "properties": [ { "name": "Quantity" } ] }
        ],
        "nodes": [
            { "id": 1, "type": "Order", "properties": { "Number": "A-1", "LineItems": [2, 3] } },
            { "id": 2, "type": "LineItem", "properties": { "Quantity": 4 } },
            { "id": 3, "type": "LineItem" }
        ]
    }"#;

    #[test]
    fn test_document_into_graph() {
        let graph = GraphDocument::from_json(DOC).unwrap().into_graph().unwrap();

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.value(NodeId(1), "Number"), Some(&json!("A-1")));
        assert_eq!(graph.list(NodeId(1), "LineItems"), &[NodeId(2), NodeId(3)]);
        assert_eq!(graph.value(NodeId(2), "Quantity"), Some(&json!(4)));

        let declared = graph.property(NodeId(1), "LineItems").unwrap();
        assert_eq!(declared.declaring_type, "Order");
    }

    #[test]
    fn test_document_rejects_bad_reference() {
        let doc = r#"{
            "types": [ { "name": "A", "properties": [ { "name": "Next", "reference": "A" } ] } ],
            "nodes": [ { "id": 1, "type": "A", "properties": { "Next": "two" } } ]
        }"#;
        let err = GraphDocument::from_json(doc)
            .unwrap()
            .into_graph()
            .unwrap_err();
        assert!(matches!(err, ModelError::TypeMismatch { .. }));
    }
}
