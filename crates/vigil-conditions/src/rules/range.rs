use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::Value;
use vigil_model::{NodeId, ObjectGraph, Schema};

use super::{default_format, default_label, property_condition_type, Label, PropertyBinding, PropertyRule, ValueFormat};
use crate::condition_type::ConditionType;
use crate::error::{ConditionError, ConditionResult};
use crate::resources::ResourceTable;

/// A value must lie within inclusive bounds.
///
/// Numbers compare numerically and strings lexically, so ISO-8601 dates work
/// as string bounds. Missing values and values not comparable with a bound pass.
pub struct RangeRule {
    binding: PropertyBinding,
    min: Option<Value>,
    max: Option<Value>,
    label: Label,
    format: ValueFormat,
    resources: Option<Arc<ResourceTable>>,
    condition_type: Arc<ConditionType>,
}

impl RangeRule {
    pub fn new(
        schema: &Schema,
        root_type: &str,
        property: &str,
        min: Option<Value>,
        max: Option<Value>,
    ) -> ConditionResult<Self> {
        let min = min.filter(|v| !v.is_null());
        let max = max.filter(|v| !v.is_null());
        match (&min, &max) {
            (None, None) => {
                return Err(ConditionError::invalid_argument(format!(
                    "range rule on {root_type}.{property} needs a bound"
                )))
            }
            (Some(lo), Some(hi)) if compare(lo, hi) == Some(Ordering::Greater) => {
                return Err(ConditionError::invalid_argument(format!(
                    "range rule on {root_type}.{property}: minimum {lo} exceeds maximum {hi}"
                )))
            }
            _ => {}
        }

        let binding = PropertyBinding::new(schema, root_type, property)?;
        let label = default_label(binding.property_name());
        let format = default_format();
        let condition_type = Self::build_type(&binding, &min, &max, &label, &format, None);
        Ok(Self {
            binding,
            min,
            max,
            label,
            format,
            resources: None,
            condition_type,
        })
    }

    pub fn with_label(mut self, label: Label) -> Self {
        self.label = label;
        self.rebuild()
    }

    /// Render bounds in messages with `format`.
    pub fn with_format(mut self, format: ValueFormat) -> Self {
        self.format = format;
        self.rebuild()
    }

    pub fn with_resources(mut self, table: Arc<ResourceTable>) -> Self {
        self.resources = Some(table);
        self.rebuild()
    }

    fn rebuild(mut self) -> Self {
        self.condition_type = Self::build_type(
            &self.binding,
            &self.min,
            &self.max,
            &self.label,
            &self.format,
            self.resources.clone(),
        );
        self
    }

    fn build_type(
        binding: &PropertyBinding,
        min: &Option<Value>,
        max: &Option<Value>,
        label: &Label,
        format: &ValueFormat,
        resources: Option<Arc<ResourceTable>>,
    ) -> Arc<ConditionType> {
        let template = match (min, max) {
            (Some(_), Some(_)) => "{property} must be between {min} and {max}.",
            (Some(_), None) => "{property} must be at least {min}.",
            _ => "{property} must be at most {max}.",
        };
        let (min, max) = (min.clone(), max.clone());
        let label = Arc::clone(label);
        let format = Arc::clone(format);
        property_condition_type(binding.code("Range"), template, resources, move |text| {
            let mut text = text.replace("{property}", &label());
            if let Some(min) = &min {
                text = text.replace("{min}", &format(min));
            }
            if let Some(max) = &max {
                text = text.replace("{max}", &format(max));
            }
            text
        })
    }
}

impl PropertyRule for RangeRule {
    fn rule_name(&self) -> &str {
        "Range"
    }

    fn binding(&self) -> &PropertyBinding {
        &self.binding
    }

    fn condition_type(&self) -> &Arc<ConditionType> {
        &self.condition_type
    }

    fn condition_applies(&self, graph: &ObjectGraph, node: NodeId) -> ConditionResult<bool> {
        let Some(value) = graph.value(node, self.binding.property_name()) else {
            return Ok(false);
        };
        let below = self
            .min
            .as_ref()
            .is_some_and(|min| compare(value, min) == Some(Ordering::Less));
        let above = self
            .max
            .as_ref()
            .is_some_and(|max| compare(value, max) == Some(Ordering::Greater));
        Ok(below || above)
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
