use std::sync::Arc;

use serde_json::Value;
use vigil_model::{NodeId, ObjectGraph, Schema};

use super::{default_label, property_condition_type, Label, PropertyBinding, PropertyRule};
use crate::condition_type::ConditionType;
use crate::error::{ConditionError, ConditionResult};
use crate::resources::ResourceTable;

/// A string property's length, in characters, must lie within bounds.
///
/// Missing values pass; pair with [`RequiredRule`](super::RequiredRule) to forbid them.
pub struct StringLengthRule {
    binding: PropertyBinding,
    min: Option<usize>,
    max: Option<usize>,
    label: Label,
    resources: Option<Arc<ResourceTable>>,
    condition_type: Arc<ConditionType>,
}

impl StringLengthRule {
    pub fn new(
        schema: &Schema,
        root_type: &str,
        property: &str,
        min: Option<usize>,
        max: Option<usize>,
    ) -> ConditionResult<Self> {
        let min = min.filter(|m| *m > 0);
        if min.is_none() && max.is_none() {
            return Err(ConditionError::invalid_argument(format!(
                "length rule on {root_type}.{property} needs a bound"
            )));
        }
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(ConditionError::invalid_argument(format!(
                    "length rule on {root_type}.{property}: minimum {lo} exceeds maximum {hi}"
                )));
            }
        }

        let binding = PropertyBinding::new(schema, root_type, property)?;
        let label = default_label(binding.property_name());
        let condition_type = Self::build_type(&binding, min, max, &label, None);
        Ok(Self {
            binding,
            min,
            max,
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

    pub fn min(&self) -> Option<usize> {
        self.min
    }

    pub fn max(&self) -> Option<usize> {
        self.max
    }

    fn rebuild(mut self) -> Self {
        self.condition_type =
            Self::build_type(&self.binding, self.min, self.max, &self.label, self.resources.clone());
        self
    }

    fn build_type(
        binding: &PropertyBinding,
        min: Option<usize>,
        max: Option<usize>,
        label: &Label,
        resources: Option<Arc<ResourceTable>>,
    ) -> Arc<ConditionType> {
        let template = match (min, max) {
            (Some(_), Some(_)) => "{property} must be between {min} and {max} characters long.",
            (Some(_), None) => "{property} must be at least {min} characters long.",
            _ => "{property} must be at most {max} characters long.",
        };
        let label = Arc::clone(label);
        property_condition_type(binding.code("StringLength"), template, resources, move |text| {
            let mut text = text.replace("{property}", &label());
            if let Some(min) = min {
                text = text.replace("{min}", &min.to_string());
            }
            if let Some(max) = max {
                text = text.replace("{max}", &max.to_string());
            }
            text
        })
    }
}

impl PropertyRule for StringLengthRule {
    fn rule_name(&self) -> &str {
        "StringLength"
    }

    fn binding(&self) -> &PropertyBinding {
        &self.binding
    }

    fn condition_type(&self) -> &Arc<ConditionType> {
        &self.condition_type
    }

    fn condition_applies(&self, graph: &ObjectGraph, node: NodeId) -> ConditionResult<bool> {
        let Some(Value::String(text)) = graph.value(node, self.binding.property_name()) else {
            return Ok(false);
        };
        let len = text.chars().count();
        Ok(self.min.is_some_and(|min| len < min) || self.max.is_some_and(|max| len > max))
    }
}
