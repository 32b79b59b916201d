//! Conditions and their targets.
//!
//! A [`Condition`] is one occurrence of a [`ConditionType`], raised against a
//! root node. Its properties may reach other nodes through path syntax, so a
//! condition can target many nodes: one [`ConditionTarget`] per node, each
//! listing the properties of that node the condition is about.
//!
//! ```text
//! Order #1 ── LineItems ──> LineItem #2 ── Product ──> Product #3
//!
//! "LineItems.Product.Name" on #1 targets
//!     #1 [LineItems], #2 [Product], #3 [Name]
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, trace, warn};
use vigil_model::{ModelPath, NodeId, ObjectGraph, PathExpr, PathStep};

use crate::condition_type::ConditionType;
use crate::error::{ConditionError, ConditionResult};
use crate::manager::{ConditionContext, RuleManagers};

/// The part of a node a condition is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionTarget {
    node: NodeId,
    properties: Vec<String>,
}

impl ConditionTarget {
    fn new(node: NodeId) -> Self {
        Self {
            node,
            properties: Vec::new(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Property names, in the order they were first attached.
    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.iter().any(|p| p == name)
    }

    fn add_property(&mut self, name: &str) {
        if !self.has_property(name) {
            self.properties.push(name.to_string());
        }
    }
}

/// An active occurrence of a condition type.
#[derive(Debug)]
pub struct Condition {
    condition_type: Arc<ConditionType>,
    message: RwLock<Arc<str>>,
    targets: RwLock<Vec<ConditionTarget>>,
}

impl Condition {
    /// Create a condition on `node` and attach it to `properties`.
    ///
    /// Without a message the condition takes the type's translated message.
    pub fn attach(
        ctx: &mut ConditionContext<'_>,
        condition_type: &Arc<ConditionType>,
        message: Option<&str>,
        node: NodeId,
        properties: &[&str],
    ) -> ConditionResult<Arc<Self>> {
        let message: Arc<str> = match message {
            Some(text) => Arc::from(text),
            None => Arc::from(condition_type.message()),
        };
        let condition = Arc::new(Self {
            condition_type: Arc::clone(condition_type),
            message: RwLock::new(message),
            targets: RwLock::new(Vec::new()),
        });

        if let Err(err) = condition.add_target(ctx, node, properties) {
            condition.destroy(ctx);
            return Err(err);
        }
        Ok(condition)
    }

    pub fn condition_type(&self) -> &Arc<ConditionType> {
        &self.condition_type
    }

    pub fn message(&self) -> Arc<str> {
        Arc::clone(&self.message.read())
    }

    pub(crate) fn set_message(&self, message: &str) {
        *self.message.write() = Arc::from(message);
    }

    /// Snapshot of the current targets.
    pub fn targets(&self) -> Vec<ConditionTarget> {
        self.targets.read().clone()
    }

    /// The target for `node`, if the condition reaches it.
    pub fn target(&self, node: NodeId) -> Option<ConditionTarget> {
        self.targets.read().iter().find(|t| t.node == node).cloned()
    }

    pub fn target_count(&self) -> usize {
        self.targets.read().len()
    }

    /// Attach the condition to `properties` of `node`.
    ///
    /// Plain names attach to `node` itself. Names with path syntax are
    /// followed through relationships, and every node reached gets a target
    /// naming the property of the step that reached it.
    pub fn add_target(
        self: &Arc<Self>,
        ctx: &mut ConditionContext<'_>,
        node: NodeId,
        properties: &[&str],
    ) -> ConditionResult<()> {
        let graph = ctx.graph();
        let root_type = graph.type_of(node).ok_or_else(|| {
            ConditionError::invalid_argument(format!("{node} is not part of the graph"))
        })?;

        if !properties.iter().any(|p| PathExpr::is_path_syntax(p)) {
            self.touch(ctx.managers_mut(), node, properties.iter().copied());
            return Ok(());
        }

        let max_depth = ctx.config().max_path_depth;
        for property in properties {
            let path = ModelPath::parse(graph.schema(), &root_type.name, property)?;
            let mut visited = HashSet::new();
            self.expand(ctx.managers_mut(), graph, node, path.first_steps(), &mut visited, max_depth);
        }
        Ok(())
    }

    fn expand(
        self: &Arc<Self>,
        managers: &mut RuleManagers,
        graph: &ObjectGraph,
        node: NodeId,
        steps: &[PathStep],
        visited: &mut HashSet<(usize, NodeId)>,
        depth: usize,
    ) {
        self.touch(managers, node, steps.iter().map(|s| s.property().name.as_str()));
        if depth == 0 {
            warn!(%node, "Path expansion reached maximum depth");
            return;
        }

        for step in steps.iter().filter(|s| !s.is_leaf()) {
            for child in step.instances(graph, node) {
                if visited.insert((step.id(), child)) {
                    self.expand(managers, graph, child, step.next_steps(), visited, depth - 1);
                } else {
                    trace!(step = step.id(), node = %child, "Step already expanded");
                }
            }
        }
    }

    /// Get or create the target for `node` and add `properties` to it.
    fn touch<'p>(
        self: &Arc<Self>,
        managers: &mut RuleManagers,
        node: NodeId,
        properties: impl IntoIterator<Item = &'p str>,
    ) {
        let created = {
            let mut targets = self.targets.write();
            let (index, created) = match targets.iter().position(|t| t.node == node) {
                Some(index) => (index, false),
                None => {
                    targets.push(ConditionTarget::new(node));
                    (targets.len() - 1, true)
                }
            };
            for property in properties {
                targets[index].add_property(property);
            }
            created
        };

        if created {
            managers.manager_mut(node).set_condition(Arc::clone(self));
        }
    }

    /// Detach from every target. Destroying twice is harmless.
    pub fn destroy(&self, ctx: &mut ConditionContext<'_>) {
        let targets = std::mem::take(&mut *self.targets.write());
        if targets.is_empty() {
            return;
        }
        let managers = ctx.managers_mut();
        for target in &targets {
            managers.release(target.node, self);
        }
        debug!(
            code = self.condition_type.code().unwrap_or_default(),
            targets = targets.len(),
            "Condition detached"
        );
    }

    /// Recompute targets from scratch.
    pub(crate) fn retarget(
        self: &Arc<Self>,
        ctx: &mut ConditionContext<'_>,
        node: NodeId,
        properties: &[&str],
    ) -> ConditionResult<()> {
        self.destroy(ctx);
        self.add_target(ctx, node, properties)
    }

    /// Active conditions on `node`.
    pub fn conditions_of(ctx: &ConditionContext<'_>, node: NodeId) -> ConditionResult<Vec<Arc<Self>>> {
        Self::conditions_of_filtered(ctx, node, |_| true)
    }

    /// Active conditions on `node` whose target for that node passes `filter`.
    pub fn conditions_of_filtered(
        ctx: &ConditionContext<'_>,
        node: NodeId,
        filter: impl Fn(&ConditionTarget) -> bool,
    ) -> ConditionResult<Vec<Arc<Self>>> {
        if !ctx.graph().contains(node) {
            return Err(ConditionError::invalid_argument(format!(
                "{node} is not part of the graph"
            )));
        }
        let Some(manager) = ctx.managers().manager(node) else {
            return Ok(Vec::new());
        };
        Ok(manager
            .conditions(|c| c.target(node).is_some_and(|t| filter(&t)))
            .cloned()
            .collect())
    }

    /// The condition as an error value.
    pub fn to_error(&self) -> ConditionError {
        ConditionError::Raised {
            code: self.condition_type.code().unwrap_or_default().to_string(),
            message: self.message().to_string(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            self.condition_type.code().unwrap_or_default(),
            self.message()
        )
    }
}

impl RuleManagers {
    /// Drop `condition` from the node's manager, unless another condition of the
    /// same type has replaced it there.
    pub(crate) fn release(&mut self, node: NodeId, condition: &Condition) {
        let current = self.condition(node, condition.condition_type());
        if current.is_some_and(|c| std::ptr::eq(Arc::as_ptr(&c), condition)) {
            self.clear(node, condition.condition_type());
        }
    }
}
