//! Rule abstractions.
//!
//! A rule evaluates one node and reconciles the condition types it owns.
//! Rules are bound to a root type and name the properties whose changes
//! should re-run them.

use std::collections::HashMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use vigil_model::{NodeId, PathExpr};

use crate::condition::Condition;
use crate::condition_type::ConditionType;
use crate::error::{ConditionError, ConditionResult};
use crate::manager::ConditionContext;

/// Unique identifier for a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId(String);

impl RuleId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RuleId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for RuleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Events on which a rule runs, as a bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationType(u8);

impl InvocationType {
    pub const NONE: Self = Self(0);
    /// A node was just created.
    pub const INIT_NEW: Self = Self(1);
    /// An existing node was loaded.
    pub const INIT_EXISTING: Self = Self(1 << 1);
    /// A property the rule depends on changed.
    pub const PROPERTY_CHANGED: Self = Self(1 << 2);
    pub const ALL: Self = Self(0b111);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for InvocationType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for InvocationType {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// A rule that reconciles conditions on nodes of one type.
pub trait Rule: Send + Sync {
    /// Unique identifier for this rule.
    fn id(&self) -> RuleId;

    /// Name of the model type the rule applies to.
    fn root_type(&self) -> &str;

    /// Events the rule runs on.
    fn invocation(&self) -> InvocationType {
        InvocationType::INIT_NEW | InvocationType::PROPERTY_CHANGED
    }

    /// Properties (or paths) whose changes re-run the rule.
    fn predicates(&self) -> Vec<String>;

    /// Condition types the rule reconciles.
    fn condition_types(&self) -> Vec<Arc<ConditionType>>;

    /// Evaluate the rule on `node`, returning the active condition, if any.
    fn invoke(&self, ctx: &mut ConditionContext<'_>, node: NodeId) -> ConditionResult<Option<Arc<Condition>>>;
}

/// Runs the governing rule of a condition type.
#[derive(Debug, Clone)]
pub struct ConditionRule {
    condition_type: Arc<ConditionType>,
    invocation: InvocationType,
}

impl ConditionRule {
    /// Wrap a condition type. Fails when the type has no code yet or no
    /// governing rule.
    pub fn new(condition_type: Arc<ConditionType>) -> ConditionResult<Self> {
        let code = condition_type.require_code()?;
        if condition_type.rule().is_none() {
            return Err(ConditionError::UnsupportedOperation {
                code: code.to_string(),
            });
        }
        Ok(Self {
            condition_type,
            invocation: InvocationType::INIT_NEW | InvocationType::PROPERTY_CHANGED,
        })
    }

    /// Run only on the given events.
    pub fn with_invocation(mut self, invocation: InvocationType) -> Self {
        self.invocation = invocation;
        self
    }
}

impl Rule for ConditionRule {
    fn id(&self) -> RuleId {
        RuleId::new(self.condition_type.code().unwrap_or_default())
    }

    fn root_type(&self) -> &str {
        self.condition_type.rule().map(|r| r.root_type()).unwrap_or_default()
    }

    fn invocation(&self) -> InvocationType {
        self.invocation
    }

    fn predicates(&self) -> Vec<String> {
        self.condition_type
            .rule()
            .map(|r| r.predicates().to_vec())
            .unwrap_or_default()
    }

    fn condition_types(&self) -> Vec<Arc<ConditionType>> {
        vec![Arc::clone(&self.condition_type)]
    }

    fn invoke(&self, ctx: &mut ConditionContext<'_>, node: NodeId) -> ConditionResult<Option<Arc<Condition>>> {
        self.condition_type.evaluate(ctx, node)
    }
}

/// What a [`RuleSet`] run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Rules invoked.
    pub invoked: usize,
    /// Invocations that left a condition active.
    pub active: usize,
}

impl RunSummary {
    fn record(&mut self, outcome: &Option<Arc<Condition>>) {
        self.invoked += 1;
        if outcome.is_some() {
            self.active += 1;
        }
    }
}

/// Rules indexed by root type.
///
/// Runs every matching rule once per call; it does not order rules or chase
/// the consequences of one rule on another.
#[derive(Default)]
pub struct RuleSet {
    rules: HashMap<String, Vec<Arc<dyn Rule>>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, rule: Arc<dyn Rule>) {
        self.rules
            .entry(rule.root_type().to_string())
            .or_default()
            .push(rule);
    }

    /// Add a rule (builder pattern).
    pub fn with_rule(mut self, rule: Arc<dyn Rule>) -> Self {
        self.add(rule);
        self
    }

    /// Rules bound to `root_type`, in the order they were added.
    pub fn rules_for(&self, root_type: &str) -> &[Arc<dyn Rule>] {
        self.rules.get(root_type).map(Vec::as_slice).unwrap_or_default()
    }

    /// Rules on `root_type` that depend on `property`, directly or as the start of a path.
    pub fn triggered_by(&self, root_type: &str, property: &str) -> Vec<&Arc<dyn Rule>> {
        self.rules_for(root_type)
            .iter()
            .filter(|rule| {
                rule.predicates().iter().any(|p| match PathExpr::parse(p) {
                    Ok(expr) => expr.root_names().contains(&property),
                    Err(_) => p == property,
                })
            })
            .collect()
    }

    /// Every condition type reconciled by some rule.
    pub fn condition_types(&self) -> Vec<Arc<ConditionType>> {
        let mut types: Vec<Arc<ConditionType>> = Vec::new();
        for rule in self.rules.values().flatten() {
            for t in rule.condition_types() {
                if !types.contains(&t) {
                    types.push(t);
                }
            }
        }
        types
    }

    /// Run the rules of the node's type that handle `event`.
    pub fn run(
        &self,
        ctx: &mut ConditionContext<'_>,
        node: NodeId,
        event: InvocationType,
    ) -> ConditionResult<RunSummary> {
        let type_name = ctx
            .graph()
            .type_of(node)
            .map(|t| t.name.as_str())
            .ok_or_else(|| ConditionError::invalid_argument(format!("{node} is not part of the graph")))?;

        let mut summary = RunSummary::default();
        for rule in self.rules_for(type_name) {
            if rule.invocation().intersects(event) {
                summary.record(&rule.invoke(ctx, node)?);
            }
        }
        debug!(%node, invoked = summary.invoked, active = summary.active, "Rules run");
        Ok(summary)
    }

    /// Run the rules of the node's type that depend on `property`.
    pub fn property_changed(
        &self,
        ctx: &mut ConditionContext<'_>,
        node: NodeId,
        property: &str,
    ) -> ConditionResult<RunSummary> {
        let type_name = ctx
            .graph()
            .type_of(node)
            .map(|t| t.name.as_str())
            .ok_or_else(|| ConditionError::invalid_argument(format!("{node} is not part of the graph")))?;

        let mut summary = RunSummary::default();
        for rule in self.triggered_by(type_name, property) {
            if rule.invocation().contains(InvocationType::PROPERTY_CHANGED) {
                summary.record(&rule.invoke(ctx, node)?);
            }
        }
        Ok(summary)
    }

    /// Run every rule once against every node of the graph.
    pub fn run_all(&self, ctx: &mut ConditionContext<'_>, event: InvocationType) -> ConditionResult<RunSummary> {
        let graph = ctx.graph();
        let mut total = RunSummary::default();
        for node in graph.nodes() {
            let summary = self.run(ctx, node.id, event)?;
            total.invoked += summary.invoked;
            total.active += summary.active;
        }
        Ok(total)
    }

    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<RuleId> = self.rules.values().flatten().map(|r| r.id()).collect();
        ids.sort();
        f.debug_struct("RuleSet")
            .field("rule_count", &ids.len())
            .field("rules", &ids)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::ConditionCategory;
    use crate::inference::SourceInference;
    use crate::manager::RuleManagers;
    use crate::predicate;
    use crate::test_fixtures::{order_graph, order_schema};

    fn no_items_rule() -> Arc<dyn Rule> {
        let t = ConditionType::error("Order.NoItems", "An order needs line items.")
            .with_predicate_rule(
                &order_schema(),
                "Order",
                predicate!(|g, n| g.list(n, "LineItems").is_empty()),
                None,
                None,
                &SourceInference::new(),
            )
            .unwrap()
            .build();
        Arc::new(ConditionRule::new(t).unwrap())
    }

    #[test]
    fn test_invocation_bits() {
        let both = InvocationType::INIT_NEW | InvocationType::PROPERTY_CHANGED;
        assert!(both.contains(InvocationType::INIT_NEW));
        assert!(!both.contains(InvocationType::INIT_EXISTING));
        assert!(both.intersects(InvocationType::ALL));
        assert!(InvocationType::NONE.is_empty());
    }

    #[test]
    fn test_condition_rule_requires_governing_rule() {
        let t = ConditionType::error("Order.X", "x").build();
        assert!(matches!(
            ConditionRule::new(t),
            Err(ConditionError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_condition_rule_requires_code() {
        let t = ConditionType::builder(ConditionCategory::Error, "An order needs line items.")
            .with_predicate_rule(
                &order_schema(),
                "Order",
                predicate!(|g, n| g.list(n, "LineItems").is_empty()),
                None,
                None,
                &SourceInference::new(),
            )
            .unwrap()
            .build();
        assert!(matches!(
            ConditionRule::new(Arc::clone(&t)),
            Err(ConditionError::UnsealedCode { .. })
        ));

        t.seal_code("Order.NoItems").unwrap();
        assert!(ConditionRule::new(t).is_ok());
    }

    #[test]
    fn test_condition_rule_with_invocation() {
        let (graph, order) = order_graph(0);
        let mut managers = RuleManagers::new();
        let mut ctx = ConditionContext::new(&graph, &mut managers);
        let t = no_items_rule().condition_types().remove(0);
        let rule = ConditionRule::new(t)
            .unwrap()
            .with_invocation(InvocationType::PROPERTY_CHANGED);
        let rules = RuleSet::new().with_rule(Arc::new(rule));

        let summary = rules.run(&mut ctx, order, InvocationType::INIT_NEW).unwrap();
        assert_eq!(summary, RunSummary::default());

        let summary = rules.property_changed(&mut ctx, order, "LineItems").unwrap();
        assert_eq!(summary, RunSummary { invoked: 1, active: 1 });
    }

    #[test]
    fn test_rules_for_and_triggers() {
        let rules = RuleSet::new().with_rule(no_items_rule());

        assert_eq!(rules.rules_for("Order").len(), 1);
        assert!(rules.rules_for("LineItem").is_empty());
        assert_eq!(rules.triggered_by("Order", "LineItems").len(), 1);
        assert!(rules.triggered_by("Order", "Number").is_empty());
        assert_eq!(rules.condition_types().len(), 1);
    }

    #[test]
    fn test_run_respects_invocation() {
        let (graph, order) = order_graph(0);
        let mut managers = RuleManagers::new();
        let mut ctx = ConditionContext::new(&graph, &mut managers);
        let rules = RuleSet::new().with_rule(no_items_rule());

        let summary = rules.run(&mut ctx, order, InvocationType::INIT_EXISTING).unwrap();
        assert_eq!(summary, RunSummary::default());

        let summary = rules.run(&mut ctx, order, InvocationType::INIT_NEW).unwrap();
        assert_eq!(summary, RunSummary { invoked: 1, active: 1 });

        let summary = rules.property_changed(&mut ctx, order, "LineItems").unwrap();
        assert_eq!(summary.active, 1);
        assert_eq!(managers.condition_count(), 1);
    }
}
