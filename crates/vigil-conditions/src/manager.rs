//! Per-node condition stores.
//!
//! Every node with active conditions has a [`RuleManager`]. Managers live in a
//! [`RuleManagers`] table owned by the caller; a [`ConditionContext`] borrows
//! the table together with the graph for the duration of a reconciliation.

use std::collections::HashMap;
use std::sync::Arc;

use vigil_model::{NodeId, ObjectGraph};

use crate::condition::Condition;
use crate::condition_type::ConditionType;
use crate::config::EngineConfig;

/// Active conditions of one node, at most one per condition type.
#[derive(Debug, Default)]
pub struct RuleManager {
    conditions: Vec<Arc<Condition>>,
}

impl RuleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The active condition of the given type.
    pub fn get_condition(&self, condition_type: &ConditionType) -> Option<&Arc<Condition>> {
        self.conditions
            .iter()
            .find(|c| **c.condition_type() == *condition_type)
    }

    /// Store a condition, replacing one of the same type.
    pub fn set_condition(&mut self, condition: Arc<Condition>) {
        match self
            .conditions
            .iter_mut()
            .find(|c| c.condition_type() == condition.condition_type())
        {
            Some(existing) => *existing = condition,
            None => self.conditions.push(condition),
        }
    }

    /// Remove the condition of the given type.
    pub fn clear_condition(&mut self, condition_type: &ConditionType) -> Option<Arc<Condition>> {
        let index = self
            .conditions
            .iter()
            .position(|c| **c.condition_type() == *condition_type)?;
        Some(self.conditions.remove(index))
    }

    /// Active conditions accepted by `filter`, in the order they were stored.
    pub fn conditions<'a>(
        &'a self,
        filter: impl Fn(&Condition) -> bool + 'a,
    ) -> impl Iterator<Item = &'a Arc<Condition>> + 'a {
        self.conditions.iter().filter(move |c| filter(c))
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Rule managers of every node, keyed by node ID.
#[derive(Debug, Default)]
pub struct RuleManagers {
    managers: HashMap<NodeId, RuleManager>,
}

impl RuleManagers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn manager(&self, node: NodeId) -> Option<&RuleManager> {
        self.managers.get(&node)
    }

    /// The node's manager, created on first use.
    pub fn manager_mut(&mut self, node: NodeId) -> &mut RuleManager {
        self.managers.entry(node).or_default()
    }

    /// The active condition of `condition_type` on `node`.
    pub fn condition(&self, node: NodeId, condition_type: &ConditionType) -> Option<Arc<Condition>> {
        self.manager(node)?.get_condition(condition_type).cloned()
    }

    /// Remove `condition_type` from the node's manager, dropping empty managers.
    pub fn clear(&mut self, node: NodeId, condition_type: &ConditionType) -> Option<Arc<Condition>> {
        let manager = self.managers.get_mut(&node)?;
        let removed = manager.clear_condition(condition_type);
        if manager.is_empty() {
            self.managers.remove(&node);
        }
        removed
    }

    /// Forget a node entirely. Conditions targeting other nodes stay attached there.
    pub fn remove_node(&mut self, node: NodeId) -> Option<RuleManager> {
        self.managers.remove(&node)
    }

    /// Nodes that currently have a manager, in ascending order.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.managers.keys().copied().collect();
        nodes.sort();
        nodes
    }

    /// Number of distinct active conditions across all nodes.
    pub fn condition_count(&self) -> usize {
        let mut seen: Vec<*const Condition> = Vec::new();
        for condition in self.managers.values().flat_map(|m| m.conditions.iter()) {
            let ptr = Arc::as_ptr(condition);
            if !seen.contains(&ptr) {
                seen.push(ptr);
            }
        }
        seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}

/// The graph and the condition stores a reconciliation works against.
pub struct ConditionContext<'a> {
    graph: &'a ObjectGraph,
    managers: &'a mut RuleManagers,
    config: EngineConfig,
}

impl<'a> ConditionContext<'a> {
    pub fn new(graph: &'a ObjectGraph, managers: &'a mut RuleManagers) -> Self {
        Self {
            graph,
            managers,
            config: EngineConfig::default(),
        }
    }

    /// Use a specific engine configuration (builder pattern).
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn graph(&self) -> &'a ObjectGraph {
        self.graph
    }

    pub fn managers(&self) -> &RuleManagers {
        &*self.managers
    }

    pub fn managers_mut(&mut self) -> &mut RuleManagers {
        &mut *self.managers
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::order_graph;

    #[test]
    fn test_set_get_clear() {
        let (graph, order) = order_graph(0);
        let mut managers = RuleManagers::new();
        let mut ctx = ConditionContext::new(&graph, &mut managers);
        let t = ConditionType::error("Order.A", "a").build();
        let other = ConditionType::error("Order.B", "b").build();

        let c = t.when(&mut ctx, order, || true, &["Number"]).unwrap().unwrap();
        let manager = managers.manager(order).unwrap();
        assert!(Arc::ptr_eq(manager.get_condition(&t).unwrap(), &c));
        assert!(manager.get_condition(&other).is_none());

        assert!(managers.clear(order, &t).is_some());
        assert!(managers.manager(order).is_none());
        assert!(managers.is_empty());
    }

    #[test]
    fn test_conditions_filter() {
        let (graph, order) = order_graph(0);
        let mut managers = RuleManagers::new();
        let mut ctx = ConditionContext::new(&graph, &mut managers);
        let error = ConditionType::error("Order.E", "e").build();
        let warning = ConditionType::warning("Order.W", "w").build();

        error.when(&mut ctx, order, || true, &["Number"]).unwrap();
        warning.when(&mut ctx, order, || true, &["Total"]).unwrap();

        let manager = managers.manager(order).unwrap();
        assert_eq!(manager.conditions(|_| true).count(), 2);
        let warnings: Vec<_> = manager
            .conditions(|c| c.condition_type().category() == crate::ConditionCategory::Warning)
            .collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].condition_type().code(), Some("Order.W"));
        assert_eq!(managers.condition_count(), 2);
    }
}
