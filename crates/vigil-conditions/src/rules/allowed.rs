use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::warn;
use vigil_model::{ModelPath, NodeId, ObjectGraph, PathStep, Schema};

use super::{default_label, property_condition_type, Label, PropertyBinding, PropertyRule};
use crate::condition_type::ConditionType;
use crate::error::{ConditionError, ConditionResult};
use crate::resources::ResourceTable;

const TEMPLATE: &str = "{property} is not an allowed value.";

type Resolver = Arc<dyn Fn(&ObjectGraph, NodeId) -> ConditionResult<Vec<NodeId>> + Send + Sync>;

/// Where the allowed targets of a relationship come from.
#[derive(Clone)]
pub enum AllowedValues {
    /// A fixed set of nodes.
    Nodes(Vec<NodeId>),
    /// Nodes reached from the checked node by a path.
    Path(ModelPath),
    /// Nodes computed by a callback.
    Resolver(Resolver),
}

impl AllowedValues {
    pub fn nodes(nodes: impl IntoIterator<Item = NodeId>) -> Self {
        Self::Nodes(nodes.into_iter().collect())
    }

    /// Nodes reached from `root_type` nodes by `path`. Every path must end on a relationship.
    pub fn path(schema: &Schema, root_type: &str, path: &str) -> ConditionResult<Self> {
        let path = ModelPath::parse(schema, root_type, path)?;
        if let Some(step) = first_value_leaf(path.first_steps()) {
            return Err(ConditionError::invalid_argument(format!(
                "allowed values path {path} ends on value property {}",
                step.property().name
            )));
        }
        Ok(Self::Path(path))
    }

    pub fn resolver<F>(resolve: F) -> Self
    where
        F: Fn(&ObjectGraph, NodeId) -> ConditionResult<Vec<NodeId>> + Send + Sync + 'static,
    {
        Self::Resolver(Arc::new(resolve))
    }

    /// The allowed nodes for `node`.
    pub fn resolve(&self, graph: &ObjectGraph, node: NodeId) -> ConditionResult<Vec<NodeId>> {
        match self {
            Self::Nodes(nodes) => Ok(nodes.clone()),
            Self::Path(path) => {
                let mut out = Vec::new();
                let mut visited = HashSet::new();
                reach(graph, node, path.first_steps(), &mut out, &mut visited);
                Ok(out)
            }
            Self::Resolver(resolve) => resolve(graph, node),
        }
    }
}

impl fmt::Debug for AllowedValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nodes(nodes) => f.debug_tuple("Nodes").field(nodes).finish(),
            Self::Path(path) => f.debug_tuple("Path").field(&path.to_string()).finish(),
            Self::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

fn first_value_leaf(steps: &[PathStep]) -> Option<&PathStep> {
    steps.iter().find_map(|step| {
        if step.is_leaf() {
            (!step.property().is_relationship()).then_some(step)
        } else {
            first_value_leaf(step.next_steps())
        }
    })
}

fn reach(
    graph: &ObjectGraph,
    node: NodeId,
    steps: &[PathStep],
    out: &mut Vec<NodeId>,
    visited: &mut HashSet<(usize, NodeId)>,
) {
    for step in steps {
        for child in step.instances(graph, node) {
            if step.is_leaf() {
                if !out.contains(&child) {
                    out.push(child);
                }
            } else if visited.insert((step.id(), child)) {
                reach(graph, child, step.next_steps(), out, visited);
            }
        }
    }
}

/// The targets of a relationship must come from an allowed set.
pub struct AllowedValuesRule {
    binding: PropertyBinding,
    source: AllowedValues,
    label: Label,
    resources: Option<Arc<ResourceTable>>,
    condition_type: Arc<ConditionType>,
}

impl AllowedValuesRule {
    pub fn new(
        schema: &Schema,
        root_type: &str,
        property: &str,
        source: AllowedValues,
    ) -> ConditionResult<Self> {
        let binding = PropertyBinding::new(schema, root_type, property)?;
        if !binding.property().is_relationship() {
            return Err(ConditionError::invalid_argument(format!(
                "allowed values need a relationship, {root_type}.{property} is a value"
            )));
        }
        let label = default_label(binding.property_name());
        let condition_type = Self::build_type(&binding, &label, None);
        Ok(Self {
            binding,
            source,
            label,
            resources: None,
            condition_type,
        })
    }

    pub fn with_label(mut self, label: Label) -> Self {
        self.label = label;
        self.rebuild()
    }

    pub fn with_resources(mut self, table: Arc<ResourceTable>) -> Self {
        self.resources = Some(table);
        self.rebuild()
    }

    pub fn source(&self) -> &AllowedValues {
        &self.source
    }

    fn rebuild(mut self) -> Self {
        self.condition_type = Self::build_type(&self.binding, &self.label, self.resources.clone());
        self
    }

    fn build_type(
        binding: &PropertyBinding,
        label: &Label,
        resources: Option<Arc<ResourceTable>>,
    ) -> Arc<ConditionType> {
        let label = Arc::clone(label);
        property_condition_type(binding.code("AllowedValues"), TEMPLATE, resources, move |text| {
            text.replace("{property}", &label())
        })
    }
}

impl PropertyRule for AllowedValuesRule {
    fn rule_name(&self) -> &str {
        "AllowedValues"
    }

    fn binding(&self) -> &PropertyBinding {
        &self.binding
    }

    fn condition_type(&self) -> &Arc<ConditionType> {
        &self.condition_type
    }

    fn dependencies(&self) -> Vec<String> {
        let mut deps = vec![self.binding.property_name().to_string()];
        if let AllowedValues::Path(path) = &self.source {
            deps.push(path.to_string());
        }
        deps
    }

    fn condition_applies(&self, graph: &ObjectGraph, node: NodeId) -> ConditionResult<bool> {
        let current = graph.related(node, self.binding.property_name());
        if current.is_empty() {
            return Ok(false);
        }
        let allowed = self.source.resolve(graph, node)?;
        if allowed.is_empty() {
            warn!(
                code = self.condition_type.code().unwrap_or_default(),
                %node,
                "Allowed values resolved to nothing"
            );
        }
        Ok(current.iter().any(|n| !allowed.contains(n)))
    }
}
