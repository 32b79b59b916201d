//! Condition types and the reconciliation entry points.
//!
//! A [`ConditionType`] describes one kind of condition: its code, category and
//! message. [`ConditionType::when`] reconciles the type against one node:
//!
//! | current | predicate | result |
//! |---------|-----------|--------|
//! | absent  | true      | a new condition is created and attached |
//! | present | true      | the existing condition is kept, message refreshed |
//! | present | false     | the existing condition is destroyed |
//! | absent  | false     | nothing happens |

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use tracing::debug;
use vigil_model::{NodeId, Schema};

use crate::category::{ConditionCategory, ConditionTypeSet};
use crate::condition::Condition;
use crate::error::{ConditionError, ConditionResult};
use crate::expression::ModelExpression;
use crate::governing::GoverningRule;
use crate::inference::{Predicate, PredicateInference};
use crate::manager::ConditionContext;
use crate::resources::ResourceTable;

/// Transforms a raw message template into the text shown to users.
pub type Translator = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// A kind of condition.
///
/// Types are shared as `Arc<ConditionType>`. Two types are equal when their
/// codes are equal.
pub struct ConditionType {
    code: OnceLock<String>,
    category: ConditionCategory,
    message: String,
    translator: OnceLock<Translator>,
    sets: Vec<ConditionTypeSet>,
    always_serialize: bool,
    rule: Option<GoverningRule>,
}

impl ConditionType {
    pub fn builder(category: ConditionCategory, message: impl Into<String>) -> ConditionTypeBuilder {
        ConditionTypeBuilder::new(category, message)
    }

    /// Builder for an error type with the given code.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> ConditionTypeBuilder {
        Self::builder(ConditionCategory::Error, message).code(code)
    }

    /// Builder for a warning type with the given code.
    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> ConditionTypeBuilder {
        Self::builder(ConditionCategory::Warning, message).code(code)
    }

    /// Builder for a permission type with the given code.
    pub fn permission(code: impl Into<String>, message: impl Into<String>) -> ConditionTypeBuilder {
        Self::builder(ConditionCategory::Permission, message).code(code)
    }

    /// Builder for an informational type with the given code.
    pub fn info(code: impl Into<String>, message: impl Into<String>) -> ConditionTypeBuilder {
        Self::builder(ConditionCategory::Info, message).code(code)
    }

    /// The code, once assigned.
    pub fn code(&self) -> Option<&str> {
        self.code.get().map(String::as_str)
    }

    /// The code, or an error naming the message when none was assigned.
    pub fn require_code(&self) -> ConditionResult<&str> {
        self.code().ok_or_else(|| ConditionError::UnsealedCode {
            message: self.message.clone(),
        })
    }

    /// Assign the code. Codes can be assigned once.
    pub fn seal_code(&self, code: impl Into<String>) -> ConditionResult<()> {
        self.code.set(code.into()).map_err(|attempted| ConditionError::CodeAlreadySealed {
            code: self.code().unwrap_or_default().to_string(),
            attempted,
        })
    }

    pub fn category(&self) -> ConditionCategory {
        self.category
    }

    /// The untranslated message template.
    pub fn message_template(&self) -> &str {
        &self.message
    }

    /// The message, passed through the translator when one is configured.
    pub fn message(&self) -> String {
        self.translate(&self.message)
    }

    /// Pass `text` through this type's translator.
    pub fn translate(&self, text: &str) -> String {
        match self.translator.get() {
            Some(translator) => translator(text),
            None => text.to_string(),
        }
    }

    pub fn has_translator(&self) -> bool {
        self.translator.get().is_some()
    }

    /// Install a translator unless one is configured. Returns whether it was installed.
    pub(crate) fn install_translator(&self, translator: Translator) -> bool {
        self.translator.set(translator).is_ok()
    }

    pub fn sets(&self) -> &[ConditionTypeSet] {
        &self.sets
    }

    pub fn in_set(&self, name: &str) -> bool {
        self.sets.iter().any(|s| s.name() == name)
    }

    /// Whether conditions of this type are exported regardless of category filters.
    pub fn always_serialize(&self) -> bool {
        self.always_serialize
    }

    pub fn rule(&self) -> Option<&GoverningRule> {
        self.rule.as_ref()
    }

    /// Evaluate the governing rule on one node and reconcile the result.
    pub fn evaluate(
        self: &Arc<Self>,
        ctx: &mut ConditionContext<'_>,
        node: NodeId,
    ) -> ConditionResult<Option<Arc<Condition>>> {
        let rule = self
            .rule
            .as_ref()
            .ok_or_else(|| ConditionError::UnsupportedOperation {
                code: self.code().unwrap_or(&self.message).to_string(),
            })?;

        let graph = ctx.graph();
        let node_type = graph
            .type_of(node)
            .ok_or_else(|| ConditionError::invalid_argument(format!("{node} is not part of the graph")))?;
        if node_type.name != rule.root_type() {
            return Err(ConditionError::invalid_argument(format!(
                "{} applies to {}, not {}",
                self.require_code()?,
                rule.root_type(),
                node_type.name
            )));
        }

        let properties: Vec<&str> = rule.properties().iter().map(String::as_str).collect();
        self.try_when(ctx, node, || rule.evaluate(graph, node), &properties)
    }

    /// Reconcile this type on `node` with the type's own message.
    pub fn when(
        self: &Arc<Self>,
        ctx: &mut ConditionContext<'_>,
        node: NodeId,
        predicate: impl FnOnce() -> bool,
        properties: &[&str],
    ) -> ConditionResult<Option<Arc<Condition>>> {
        self.try_when(ctx, node, || Ok::<_, std::convert::Infallible>(predicate()), properties)
    }

    /// Reconcile this type on `node` with a specific message.
    pub fn when_with_message(
        self: &Arc<Self>,
        ctx: &mut ConditionContext<'_>,
        message: &str,
        node: NodeId,
        predicate: impl FnOnce() -> bool,
        properties: &[&str],
    ) -> ConditionResult<Option<Arc<Condition>>> {
        self.try_when_with_message(
            ctx,
            message,
            node,
            || Ok::<_, std::convert::Infallible>(predicate()),
            properties,
        )
    }

    /// Reconcile with a fallible predicate and the type's current message.
    /// A failing predicate leaves state untouched.
    pub fn try_when<E>(
        self: &Arc<Self>,
        ctx: &mut ConditionContext<'_>,
        node: NodeId,
        predicate: impl FnOnce() -> Result<bool, E>,
        properties: &[&str],
    ) -> ConditionResult<Option<Arc<Condition>>>
    where
        E: Into<ConditionError>,
    {
        let message = self.message();
        self.try_when_with_message(ctx, &message, node, predicate, properties)
    }

    /// Reconcile with a fallible predicate and a specific message.
    ///
    /// An explicit empty `message` means the type's own message for new
    /// conditions and leaves the message of existing conditions alone.
    pub fn try_when_with_message<E>(
        self: &Arc<Self>,
        ctx: &mut ConditionContext<'_>,
        message: &str,
        node: NodeId,
        predicate: impl FnOnce() -> Result<bool, E>,
        properties: &[&str],
    ) -> ConditionResult<Option<Arc<Condition>>>
    where
        E: Into<ConditionError>,
    {
        let code = self.require_code()?;
        if !ctx.graph().contains(node) {
            return Err(ConditionError::invalid_argument(format!(
                "{node} is not part of the graph"
            )));
        }

        let current = ctx.managers().condition(node, self);
        let applies = predicate().map_err(Into::into)?;

        match (current, applies) {
            (None, true) => {
                let message = (!message.is_empty()).then_some(message);
                let condition = Condition::attach(ctx, self, message, node, properties)?;
                debug!(code, %node, targets = condition.target_count(), "Condition created");
                Ok(Some(condition))
            }
            (Some(condition), true) => {
                if !message.is_empty() && *condition.message() != *message {
                    condition.set_message(message);
                    debug!(code, %node, "Condition message updated");
                }
                if ctx.config().refresh_targets_on_update {
                    condition.retarget(ctx, node, properties)?;
                }
                Ok(Some(condition))
            }
            (Some(condition), false) => {
                condition.destroy(ctx);
                debug!(code, %node, "Condition destroyed");
                Ok(None)
            }
            (None, false) => Ok(None),
        }
    }
}

impl PartialEq for ConditionType {
    fn eq(&self, other: &Self) -> bool {
        self.code() == other.code()
    }
}

impl Eq for ConditionType {}

impl Hash for ConditionType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code().hash(state);
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code().unwrap_or_default(), self.message())
    }
}

impl fmt::Debug for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionType")
            .field("code", &self.code())
            .field("category", &self.category)
            .field("message", &self.message)
            .field("translated", &self.has_translator())
            .field("sets", &self.sets)
            .field("always_serialize", &self.always_serialize)
            .field("rule", &self.rule)
            .finish()
    }
}

/// Builder for [`ConditionType`].
pub struct ConditionTypeBuilder {
    code: Option<String>,
    category: ConditionCategory,
    message: String,
    resources: Option<Arc<ResourceTable>>,
    translator: Option<Translator>,
    sets: Vec<ConditionTypeSet>,
    always_serialize: bool,
    rule: Option<GoverningRule>,
}

impl ConditionTypeBuilder {
    pub fn new(category: ConditionCategory, message: impl Into<String>) -> Self {
        Self {
            code: None,
            category,
            message: message.into(),
            resources: None,
            translator: None,
            sets: Vec::new(),
            always_serialize: false,
            rule: None,
        }
    }

    /// Assign the code up front. Without one, the code is sealed on registration.
    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Look the message template up in `table` on every read.
    pub fn resources(mut self, table: Arc<ResourceTable>) -> Self {
        self.resources = Some(table);
        self
    }

    /// Transform the message on every read, after any resource lookup.
    pub fn translator<F>(mut self, translator: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.translator = Some(Arc::new(translator));
        self
    }

    /// Tag the type with a set.
    pub fn set(mut self, set: impl Into<ConditionTypeSet>) -> Self {
        self.sets.push(set.into());
        self
    }

    pub fn always_serialize(mut self, always: bool) -> Self {
        self.always_serialize = always;
        self
    }

    pub fn rule(mut self, rule: GoverningRule) -> Self {
        self.rule = Some(rule);
        self
    }

    /// Govern the type by a boolean expression over nodes of `root_type`.
    pub fn with_expression_rule(
        self,
        root_type: impl Into<String>,
        expression: ModelExpression<bool>,
        properties: Option<Vec<String>>,
    ) -> ConditionResult<Self> {
        Ok(self.rule(GoverningRule::from_expression(root_type, expression, properties)?))
    }

    /// Govern the type by an opaque predicate over nodes of `root_type`.
    pub fn with_predicate_rule(
        self,
        schema: &Schema,
        root_type: &str,
        predicate: Predicate,
        predicates: Option<Vec<String>>,
        properties: Option<Vec<String>>,
        inference: &dyn PredicateInference,
    ) -> ConditionResult<Self> {
        let rule =
            GoverningRule::from_predicate(schema, root_type, predicate, predicates, properties, inference)?;
        Ok(self.rule(rule))
    }

    pub fn build(self) -> Arc<ConditionType> {
        let code = OnceLock::new();
        if let Some(c) = self.code {
            let _ = code.set(c);
        }

        let translator = OnceLock::new();
        let composed = match (self.resources, self.translator) {
            (Some(table), secondary) => Some(compose(table, secondary)),
            (None, secondary) => secondary,
        };
        if let Some(t) = composed {
            let _ = translator.set(t);
        }

        Arc::new(ConditionType {
            code,
            category: self.category,
            message: self.message,
            translator,
            sets: self.sets,
            always_serialize: self.always_serialize,
            rule: self.rule,
        })
    }
}

/// Resource lookup keyed by the raw template, then the optional secondary transform.
pub(crate) fn compose(table: Arc<ResourceTable>, secondary: Option<Translator>) -> Translator {
    Arc::new(move |raw| {
        let text = table.lookup(raw).unwrap_or_else(|| raw.to_string());
        match &secondary {
            Some(transform) => transform(&text),
            None => text,
        }
    })
}
