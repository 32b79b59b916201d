use std::sync::Arc;

use vigil_model::{NodeId, ObjectGraph, PathExpr, Schema};

use super::{default_label, property_condition_type, Label, PropertyBinding, PropertyRule};
use crate::condition_type::ConditionType;
use crate::error::ConditionResult;
use crate::expression::ModelExpression;
use crate::resources::ResourceTable;

const DEFAULT_TEMPLATE: &str = "{property} is invalid.";

/// Message of a [`ValidationRule`].
#[derive(Debug, Clone)]
pub enum ValidationMessage {
    /// A fixed template.
    Text(String),
    /// A resource key, looked up in the rule's resource table.
    Resource(String),
    /// Computed from the node when the rule fails.
    Expression(ModelExpression<String>),
}

/// A property is invalid while a boolean expression holds.
///
/// The rule re-runs on the property itself and on every path the validation
/// and message expressions read.
pub struct ValidationRule {
    binding: PropertyBinding,
    name: String,
    validation: ModelExpression<bool>,
    message: ValidationMessage,
    path: Option<PathExpr>,
    additional: Vec<String>,
    label: Label,
    resources: Option<Arc<ResourceTable>>,
    condition_type: Arc<ConditionType>,
}

impl ValidationRule {
    pub fn new(
        schema: &Schema,
        root_type: &str,
        property: &str,
        name: impl Into<String>,
        validation: ModelExpression<bool>,
        message: ValidationMessage,
    ) -> ConditionResult<Self> {
        let binding = PropertyBinding::new(schema, root_type, property)?;
        let name = name.into();
        let label = default_label(binding.property_name());
        let path = merged_path(&validation, &message);
        let condition_type = Self::build_type(&binding, &name, &message, &label, None);
        Ok(Self {
            binding,
            name,
            validation,
            message,
            path,
            additional: Vec::new(),
            label,
            resources: None,
            condition_type,
        })
    }

    /// Re-run the rule when any of `predicates` change as well.
    pub fn with_predicates(mut self, predicates: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.additional.extend(predicates.into_iter().map(Into::into));
        self
    }

    pub fn with_label(mut self, label: Label) -> Self {
        self.label = label;
        self.rebuild()
    }

    pub fn with_resources(mut self, table: Arc<ResourceTable>) -> Self {
        self.resources = Some(table);
        self.rebuild()
    }

    /// Union of the paths read by the validation and message expressions.
    pub fn path(&self) -> Option<&PathExpr> {
        self.path.as_ref()
    }

    fn rebuild(mut self) -> Self {
        self.condition_type = Self::build_type(
            &self.binding,
            &self.name,
            &self.message,
            &self.label,
            self.resources.clone(),
        );
        self
    }

    fn build_type(
        binding: &PropertyBinding,
        name: &str,
        message: &ValidationMessage,
        label: &Label,
        resources: Option<Arc<ResourceTable>>,
    ) -> Arc<ConditionType> {
        let template = match message {
            ValidationMessage::Text(text) | ValidationMessage::Resource(text) => text.as_str(),
            ValidationMessage::Expression(_) => DEFAULT_TEMPLATE,
        };
        let label = Arc::clone(label);
        property_condition_type(binding.code(name), template, resources, move |text| {
            text.replace("{property}", &label())
        })
    }
}

fn merged_path(validation: &ModelExpression<bool>, message: &ValidationMessage) -> Option<PathExpr> {
    let mut members: Vec<PathExpr> = Vec::new();
    let message_path = match message {
        ValidationMessage::Expression(expr) => expr.path(),
        _ => None,
    };
    for path in validation.path().into_iter().chain(message_path) {
        for member in path.members() {
            if !members.contains(member) {
                members.push(member.clone());
            }
        }
    }
    PathExpr::union_of(members)
}

impl PropertyRule for ValidationRule {
    fn rule_name(&self) -> &str {
        &self.name
    }

    fn binding(&self) -> &PropertyBinding {
        &self.binding
    }

    fn condition_type(&self) -> &Arc<ConditionType> {
        &self.condition_type
    }

    fn dependencies(&self) -> Vec<String> {
        let mut deps = vec![self.binding.property_name().to_string()];
        deps.extend(self.path.iter().map(ToString::to_string));
        for extra in &self.additional {
            if !deps.contains(extra) {
                deps.push(extra.clone());
            }
        }
        deps
    }

    fn condition_applies(&self, graph: &ObjectGraph, node: NodeId) -> ConditionResult<bool> {
        self.validation.evaluate(graph, node)
    }

    fn violation_message(&self, graph: &ObjectGraph, node: NodeId) -> ConditionResult<String> {
        match &self.message {
            ValidationMessage::Expression(expr) => Ok(self.condition_type.translate(&expr.evaluate(graph, node)?)),
            _ => Ok(self.condition_type.message()),
        }
    }
}
