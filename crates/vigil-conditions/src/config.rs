//! Configuration for the engine and for rule sets loaded from JSON.
//!
//! A rule-set document declares resource tables, plain condition types, and
//! property annotations that become [`PropertyRule`](crate::rules::PropertyRule)s:
//!
//! ```json
//! {
//!   "resources": [
//!     { "name": "orders", "source_types": ["Order"],
//!       "entries": { "en": { "empty": "The order has no line items." } } }
//!   ],
//!   "condition_types": [
//!     { "model_type": "Order", "name": "Empty", "category": "Warning", "message": "empty" }
//!   ],
//!   "properties": {
//!     "Order": {
//!       "Number": { "required": true, "length": { "max": 10 } },
//!       "Total": { "range": { "min": 0 }, "format": "${value}" }
//!     }
//!   },
//!   "types": {
//!     "Status": { "allowed": { "nodes": [7, 8] } }
//!   }
//! }
//! ```
//!
//! Allowed values declared under `types` apply to every relationship that
//! references the type, unless the relationship declares its own.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use vigil_model::{NodeId, Schema};

use crate::category::{ConditionCategory, ConditionTypeSet};
use crate::condition_type::ConditionType;
use crate::error::{ConditionError, ConditionResult};
use crate::registry::ConditionTypeRegistry;
use crate::resources::{ResourceDocument, ResourceTable};
use crate::rule::{Rule, RuleSet};
use crate::rules::{
    default_format, fixed_label, AllowedValues, AllowedValuesRule, Label, PropertyRule, RangeRule,
    RequiredRule, StringLengthRule, ValueFormat,
};

/// Engine behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Recompute the targets of a condition that still applies, instead of
    /// only refreshing its message.
    #[serde(default)]
    pub refresh_targets_on_update: bool,

    /// Deepest relationship chain followed when expanding paths.
    #[serde(default = "default_max_path_depth")]
    pub max_path_depth: usize,
}

fn default_max_path_depth() -> usize {
    64
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_targets_on_update: false,
            max_path_depth: default_max_path_depth(),
        }
    }
}

/// A condition type declared in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionTypeConfig {
    /// Owning model type; the code becomes `"<model_type>.<name>"`.
    pub model_type: String,
    pub name: String,
    #[serde(default)]
    pub category: ConditionCategory,
    pub message: String,
    #[serde(default)]
    pub sets: Vec<ConditionTypeSet>,
    #[serde(default)]
    pub always_serialize: bool,
}

/// Length bounds, in characters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LengthConfig {
    #[serde(default)]
    pub min: Option<usize>,
    #[serde(default)]
    pub max: Option<usize>,
}

/// Inclusive value bounds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RangeConfig {
    #[serde(default)]
    pub min: Option<Value>,
    #[serde(default)]
    pub max: Option<Value>,
}

/// Allowed targets of a relationship: a path from the node, or fixed node IDs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllowedConfig {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub nodes: Option<Vec<NodeId>>,
}

/// Rules declared on one property.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyAnnotations {
    #[serde(default)]
    pub required: bool,
    /// Display name used in messages; derived from the property name when absent.
    #[serde(default)]
    pub label: Option<String>,
    /// Message format for range bounds; `{value}` is replaced by the bound.
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub length: Option<LengthConfig>,
    #[serde(default)]
    pub range: Option<RangeConfig>,
    #[serde(default)]
    pub allowed: Option<AllowedConfig>,
}

/// Rules declared on a model type for every relationship that references it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeAnnotations {
    /// Resolved from the referencing node.
    #[serde(default)]
    pub allowed: Option<AllowedConfig>,
}

/// A complete rule-set document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleSetConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub resources: Vec<ResourceDocument>,
    #[serde(default)]
    pub condition_types: Vec<ConditionTypeConfig>,
    /// Annotations by model type, then property.
    #[serde(default)]
    pub properties: BTreeMap<String, BTreeMap<String, PropertyAnnotations>>,
    /// Annotations by referenced model type.
    #[serde(default)]
    pub types: BTreeMap<String, TypeAnnotations>,
}

impl RuleSetConfig {
    pub fn from_json(json: &str) -> ConditionResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Register resources and condition types, and build the property rules.
    pub fn build(&self, schema: &Schema, registry: &mut ConditionTypeRegistry) -> ConditionResult<RuleSet> {
        for document in &self.resources {
            let table = Arc::new(document.to_table());
            registry.map_resources(document.source_types.iter().cloned(), table);
        }

        for declared in &self.condition_types {
            schema.require(&declared.model_type)?;
            let mut builder = ConditionType::builder(declared.category, declared.message.clone())
                .always_serialize(declared.always_serialize);
            for set in &declared.sets {
                builder = builder.set(set.clone());
            }
            registry.register_member(builder.build(), &declared.model_type, &declared.name)?;
        }

        let mut rules = RuleSet::new();
        for (type_name, properties) in &self.properties {
            let resources = registry.resources_for(type_name);
            for (property, annotations) in properties {
                for rule in annotations.rules(schema, type_name, property, resources.clone())? {
                    registry.register_for(type_name, Arc::clone(&rule.condition_types()[0]))?;
                    rules.add(rule);
                }
            }
        }

        for (referenced, annotations) in &self.types {
            schema.require(referenced)?;
            let Some(allowed) = &annotations.allowed else {
                continue;
            };
            for model_type in schema.types() {
                let resources = registry.resources_for(&model_type.name);
                for property in &model_type.properties {
                    if property.target_type() != Some(referenced.as_str()) {
                        continue;
                    }
                    let declared = self
                        .properties
                        .get(&model_type.name)
                        .and_then(|properties| properties.get(&property.name));
                    if declared.is_some_and(|a| a.allowed.is_some()) {
                        continue;
                    }
                    let label = declared.and_then(|a| a.label.clone()).map(fixed_label);
                    let rule: Arc<dyn Rule> = Arc::new(allowed_rule(
                        schema,
                        &model_type.name,
                        &property.name,
                        allowed,
                        label,
                        &resources,
                    )?);
                    registry.register_for(&model_type.name, Arc::clone(&rule.condition_types()[0]))?;
                    rules.add(rule);
                }
            }
        }

        debug!(
            rules = rules.len(),
            condition_types = registry.len(),
            "Rule set built"
        );
        Ok(rules)
    }
}

impl PropertyAnnotations {
    fn rules(
        &self,
        schema: &Schema,
        type_name: &str,
        property: &str,
        resources: Option<Arc<ResourceTable>>,
    ) -> ConditionResult<Vec<Arc<dyn Rule>>> {
        let label = self.label.clone().map(fixed_label);
        let mut rules: Vec<Arc<dyn Rule>> = Vec::new();

        if self.required {
            let mut rule = RequiredRule::new(schema, type_name, property)?;
            if let Some(label) = &label {
                rule = rule.with_label(Arc::clone(label));
            }
            rules.push(Arc::new(localize(rule, &resources, RequiredRule::with_resources)));
        }

        if let Some(length) = &self.length {
            let mut rule = StringLengthRule::new(schema, type_name, property, length.min, length.max)?;
            if let Some(label) = &label {
                rule = rule.with_label(Arc::clone(label));
            }
            rules.push(Arc::new(localize(rule, &resources, StringLengthRule::with_resources)));
        }

        if let Some(range) = &self.range {
            let mut rule = RangeRule::new(schema, type_name, property, range.min.clone(), range.max.clone())?;
            if let Some(label) = &label {
                rule = rule.with_label(Arc::clone(label));
            }
            if let Some(format) = &self.format {
                rule = rule.with_format(value_format(format));
            }
            rules.push(Arc::new(localize(rule, &resources, RangeRule::with_resources)));
        }

        if let Some(allowed) = &self.allowed {
            rules.push(Arc::new(allowed_rule(
                schema, type_name, property, allowed, label, &resources,
            )?));
        }

        Ok(rules)
    }
}

fn allowed_rule(
    schema: &Schema,
    type_name: &str,
    property: &str,
    allowed: &AllowedConfig,
    label: Option<Label>,
    resources: &Option<Arc<ResourceTable>>,
) -> ConditionResult<AllowedValuesRule> {
    let source = match (&allowed.path, &allowed.nodes) {
        (Some(path), _) => AllowedValues::path(schema, type_name, path)?,
        (None, Some(nodes)) => AllowedValues::nodes(nodes.iter().copied()),
        (None, None) => {
            return Err(ConditionError::invalid_argument(format!(
                "allowed values on {type_name}.{property} need a path or nodes"
            )))
        }
    };
    let mut rule = AllowedValuesRule::new(schema, type_name, property, source)?;
    if let Some(label) = label {
        rule = rule.with_label(label);
    }
    Ok(localize(rule, resources, AllowedValuesRule::with_resources))
}

fn localize<R: PropertyRule>(
    rule: R,
    resources: &Option<Arc<ResourceTable>>,
    with_resources: fn(R, Arc<ResourceTable>) -> R,
) -> R {
    match resources {
        Some(table) => with_resources(rule, Arc::clone(table)),
        None => rule,
    }
}

fn value_format(pattern: &str) -> ValueFormat {
    let pattern = pattern.to_string();
    let plain = default_format();
    Arc::new(move |value| pattern.replace("{value}", &plain(value)))
}
