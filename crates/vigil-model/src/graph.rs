//! In-memory object graph.

use std::collections::{BTreeMap, HashMap};

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ModelError, ModelResult};
use crate::schema::{ModelType, PropertyDef, Schema};
use crate::NodeId;

/// Current content of one property on one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    /// A plain JSON value.
    Scalar(Value),
    /// A to-one relationship.
    Reference(Option<NodeId>),
    /// A to-many relationship, in insertion order.
    List(Vec<NodeId>),
}

/// A typed node and its property values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub type_name: String,
    #[serde(default)]
    pub values: HashMap<String, PropertyValue>,
}

impl GraphNode {
    fn new(id: NodeId, type_name: impl Into<String>) -> Self {
        Self {
            id,
            type_name: type_name.into(),
            values: HashMap::new(),
        }
    }
}

/// A mutable graph of typed nodes governed by a [`Schema`].
#[derive(Debug, Clone, Default)]
pub struct ObjectGraph {
    schema: Schema,
    nodes: BTreeMap<NodeId, GraphNode>,
    next_id: u64,
}

impl ObjectGraph {
    /// Create an empty graph for the given schema.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            nodes: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Add a node of the given type with the next free ID.
    pub fn add_node(&mut self, type_name: &str) -> ModelResult<NodeId> {
        let id = NodeId(self.next_id.max(1));
        self.insert_node(id, type_name)?;
        Ok(id)
    }

    /// Add a node with an explicit ID.
    pub fn insert_node(&mut self, id: NodeId, type_name: &str) -> ModelResult<()> {
        self.schema.require(type_name)?;
        if self.nodes.contains_key(&id) {
            return Err(ModelError::DuplicateNode { node_id: id });
        }
        self.nodes.insert(id, GraphNode::new(id, type_name));
        self.next_id = self.next_id.max(id.0 + 1);
        Ok(())
    }

    /// Remove a node. References to it from other nodes are cleared.
    pub fn remove_node(&mut self, id: NodeId) -> Option<GraphNode> {
        let removed = self.nodes.remove(&id)?;
        for node in self.nodes.values_mut() {
            for value in node.values.values_mut() {
                match value {
                    PropertyValue::Reference(target) if *target == Some(id) => *target = None,
                    PropertyValue::List(items) => items.retain(|item| *item != id),
                    _ => {}
                }
            }
        }
        Some(removed)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    /// Look up a node, failing when it does not exist.
    pub fn require(&self, id: NodeId) -> ModelResult<&GraphNode> {
        self.nodes
            .get(&id)
            .ok_or(ModelError::NodeNotFound { node_id: id })
    }

    /// Model type of a node.
    pub fn type_of(&self, id: NodeId) -> Option<&ModelType> {
        self.nodes
            .get(&id)
            .and_then(|node| self.schema.get(&node.type_name))
    }

    /// Iterate over all nodes in ID order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// Iterate over the IDs of nodes of one type.
    pub fn nodes_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.nodes
            .values()
            .filter(move |node| node.type_name == type_name)
            .map(|node| node.id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Declared property of a node's type.
    pub fn property(&self, id: NodeId, property: &str) -> ModelResult<&PropertyDef> {
        let node = self.require(id)?;
        self.schema.property(&node.type_name, property)
    }

    /// Set a value property.
    pub fn set_value(
        &mut self,
        id: NodeId,
        property: &str,
        value: impl Into<Value>,
    ) -> ModelResult<()> {
        let def = self.property(id, property)?;
        if def.is_relationship() {
            return Err(ModelError::NotAValue {
                type_name: def.declaring_type.clone(),
                property: property.to_string(),
            });
        }
        self.node_mut(id)?
            .values
            .insert(property.to_string(), PropertyValue::Scalar(value.into()));
        Ok(())
    }

    /// Current value of a value property; `None` when it was never set.
    pub fn value(&self, id: NodeId, property: &str) -> Option<&Value> {
        match self.nodes.get(&id)?.values.get(property)? {
            PropertyValue::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// Set or clear a to-one relationship.
    pub fn set_reference(
        &mut self,
        id: NodeId,
        property: &str,
        target: Option<NodeId>,
    ) -> ModelResult<()> {
        let def = self.relationship(id, property, false)?;
        if let Some(target) = target {
            self.check_target(&def, target)?;
        }
        self.node_mut(id)?
            .values
            .insert(property.to_string(), PropertyValue::Reference(target));
        Ok(())
    }

    /// Current target of a to-one relationship.
    pub fn reference(&self, id: NodeId, property: &str) -> Option<NodeId> {
        match self.nodes.get(&id)?.values.get(property)? {
            PropertyValue::Reference(target) => *target,
            _ => None,
        }
    }

    /// Append a node to a to-many relationship. Already-present nodes are ignored.
    pub fn push(&mut self, id: NodeId, property: &str, item: NodeId) -> ModelResult<()> {
        let def = self.relationship(id, property, true)?;
        self.check_target(&def, item)?;
        let slot = self
            .node_mut(id)?
            .values
            .entry(property.to_string())
            .or_insert_with(|| PropertyValue::List(Vec::new()));
        match slot {
            PropertyValue::List(items) => {
                if !items.contains(&item) {
                    items.push(item);
                }
            }
            other => *other = PropertyValue::List(vec![item]),
        }
        Ok(())
    }

    /// Remove a node from a to-many relationship. Returns whether it was present.
    pub fn remove(&mut self, id: NodeId, property: &str, item: NodeId) -> ModelResult<bool> {
        self.relationship(id, property, true)?;
        match self.node_mut(id)?.values.get_mut(property) {
            Some(PropertyValue::List(items)) => {
                let before = items.len();
                items.retain(|existing| *existing != item);
                Ok(items.len() != before)
            }
            _ => Ok(false),
        }
    }

    /// Current members of a to-many relationship.
    pub fn list(&self, id: NodeId, property: &str) -> &[NodeId] {
        match self.nodes.get(&id).and_then(|node| node.values.get(property)) {
            Some(PropertyValue::List(items)) => items,
            _ => &[],
        }
    }

    /// Nodes reached from `id` through a relationship property.
    ///
    /// One node at most for a to-one relation, every member for a to-many relation,
    /// nothing for value properties.
    pub fn related(&self, id: NodeId, property: &str) -> Vec<NodeId> {
        match self.nodes.get(&id).and_then(|node| node.values.get(property)) {
            Some(PropertyValue::Reference(Some(target))) => vec![*target],
            Some(PropertyValue::List(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// Whether a property currently has no value: never set, JSON null, or an
    /// empty to-one reference. To-many relationships are never "unset"; check
    /// their length instead.
    pub fn is_unset(&self, id: NodeId, property: &str) -> bool {
        match self.nodes.get(&id).and_then(|node| node.values.get(property)) {
            None => true,
            Some(PropertyValue::Scalar(Value::Null)) => true,
            Some(PropertyValue::Reference(None)) => true,
            Some(_) => false,
        }
    }

    /// Convert to a petgraph `StableDiGraph`, one edge per relationship member.
    /// Returns the graph and a mapping from NodeId to NodeIndex.
    pub fn to_petgraph(&self) -> (StableDiGraph<NodeId, String>, HashMap<NodeId, NodeIndex>) {
        let mut graph = StableDiGraph::new();
        let mut id_to_index = HashMap::new();

        for node in self.nodes.values() {
            let idx = graph.add_node(node.id);
            id_to_index.insert(node.id, idx);
        }

        for node in self.nodes.values() {
            let mut properties: Vec<_> = node.values.keys().collect();
            properties.sort();
            for property in properties {
                for target in self.related(node.id, property) {
                    if let (Some(&from), Some(&to)) =
                        (id_to_index.get(&node.id), id_to_index.get(&target))
                    {
                        graph.add_edge(from, to, property.clone());
                    }
                }
            }
        }

        (graph, id_to_index)
    }

    fn relationship(&self, id: NodeId, property: &str, list: bool) -> ModelResult<PropertyDef> {
        let def = self.property(id, property)?;
        if !def.is_relationship() || def.is_list() != list {
            return Err(ModelError::NotARelationship {
                type_name: def.declaring_type.clone(),
                property: property.to_string(),
                expected: if list { "to-many" } else { "to-one" },
            });
        }
        Ok(def.clone())
    }

    fn check_target(&self, def: &PropertyDef, target: NodeId) -> ModelResult<()> {
        let node = self.require(target)?;
        let expected = def.target_type().unwrap_or_default();
        if node.type_name != expected {
            return Err(ModelError::TypeMismatch {
                property: def.name.clone(),
                expected: expected.to_string(),
                found: node.type_name.clone(),
            });
        }
        Ok(())
    }

    fn node_mut(&mut self, id: NodeId) -> ModelResult<&mut GraphNode> {
        self.nodes
            .get_mut(&id)
            .ok_or(ModelError::NodeNotFound { node_id: id })
    }
}
