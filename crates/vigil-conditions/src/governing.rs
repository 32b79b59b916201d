//! Rules that decide, per node, whether a condition type applies.

use std::fmt;
use std::sync::Arc;

use vigil_model::{NodeId, ObjectGraph, Schema};

use crate::error::{ConditionError, ConditionResult};
use crate::expression::ModelExpression;
use crate::inference::{Predicate, PredicateInference};

type Evaluator = Arc<dyn Fn(&ObjectGraph, NodeId) -> ConditionResult<bool> + Send + Sync>;

/// The predicate governing a condition type on nodes of one root type.
///
/// `predicates` name what the predicate reads, so a change to any of them
/// re-evaluates it. `properties` name what the resulting condition attaches to.
#[derive(Clone)]
pub struct GoverningRule {
    root_type: String,
    predicates: Vec<String>,
    properties: Vec<String>,
    evaluate: Evaluator,
}

impl GoverningRule {
    /// Govern by a boolean expression. Dependencies come from the expression's path
    /// unless `properties` lists them.
    pub fn from_expression(
        root_type: impl Into<String>,
        expression: ModelExpression<bool>,
        properties: Option<Vec<String>>,
    ) -> ConditionResult<Self> {
        let root_type = root_type.into();
        let predicates: Vec<String> = expression
            .path()
            .map(|path| path.members().iter().map(ToString::to_string).collect())
            .unwrap_or_default();
        let properties = properties.unwrap_or_else(|| predicates.clone());
        let predicates = if predicates.is_empty() {
            properties.clone()
        } else {
            predicates
        };
        if predicates.is_empty() {
            return Err(ConditionError::MissingDependencies { root_type });
        }

        Ok(Self {
            root_type,
            predicates,
            properties,
            evaluate: Arc::new(move |graph, node| expression.evaluate(graph, node)),
        })
    }

    /// Govern by an opaque predicate.
    ///
    /// Omitted `predicates` are inferred, restricted to properties the root type
    /// declares. Omitted `properties` default to the predicates.
    pub fn from_predicate(
        schema: &Schema,
        root_type: &str,
        predicate: Predicate,
        predicates: Option<Vec<String>>,
        properties: Option<Vec<String>>,
        inference: &dyn PredicateInference,
    ) -> ConditionResult<Self> {
        let model_type = schema.require(root_type)?;
        let predicates = match predicates {
            Some(explicit) => explicit,
            None => inference.infer(&predicate, &|name| model_type.has_property(name)),
        };
        if predicates.is_empty() {
            return Err(ConditionError::MissingDependencies {
                root_type: root_type.to_string(),
            });
        }
        let properties = properties.unwrap_or_else(|| predicates.clone());

        Ok(Self {
            root_type: root_type.to_string(),
            predicates,
            properties,
            evaluate: Arc::new(move |graph, node| Ok(predicate.test(graph, node))),
        })
    }

    pub fn root_type(&self) -> &str {
        &self.root_type
    }

    /// Properties whose changes re-evaluate the rule.
    pub fn predicates(&self) -> &[String] {
        &self.predicates
    }

    /// Properties the condition attaches to.
    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    pub fn evaluate(&self, graph: &ObjectGraph, node: NodeId) -> ConditionResult<bool> {
        (self.evaluate)(graph, node)
    }
}

impl fmt::Debug for GoverningRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoverningRule")
            .field("root_type", &self.root_type)
            .field("predicates", &self.predicates)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}
