//! Serializable views of active conditions.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use vigil_model::{NodeId, ObjectGraph};

use crate::category::ConditionCategory;
use crate::condition::Condition;
use crate::condition_type::ConditionType;
use crate::manager::RuleManagers;

/// A condition as written out for clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionExport {
    pub condition_type_code: String,
    pub category: ConditionCategory,
    pub message: String,
    pub targets: Vec<TargetExport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetExport {
    pub node_reference: NodeReference,
    pub properties: Vec<String>,
}

/// Type and ID of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReference {
    #[serde(rename = "type")]
    pub type_name: String,
    pub id: NodeId,
}

impl Condition {
    pub fn export(&self, graph: &ObjectGraph) -> ConditionExport {
        let targets = self
            .targets()
            .into_iter()
            .map(|target| TargetExport {
                node_reference: NodeReference {
                    type_name: graph
                        .node(target.node())
                        .map(|n| n.type_name.clone())
                        .unwrap_or_default(),
                    id: target.node(),
                },
                properties: target.properties().to_vec(),
            })
            .collect();

        ConditionExport {
            condition_type_code: self.condition_type().code().unwrap_or_default().to_string(),
            category: self.condition_type().category(),
            message: self.message().to_string(),
            targets,
        }
    }
}

/// Selects which conditions are exported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportFilter {
    /// Categories to export; `None` exports all.
    #[serde(default)]
    pub categories: Option<Vec<ConditionCategory>>,
}

impl ExportFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only(categories: impl IntoIterator<Item = ConditionCategory>) -> Self {
        Self {
            categories: Some(categories.into_iter().collect()),
        }
    }

    /// Whether conditions of `condition_type` pass. Types marked
    /// always-serialize pass regardless of category.
    pub fn includes(&self, condition_type: &ConditionType) -> bool {
        if condition_type.always_serialize() {
            return true;
        }
        match &self.categories {
            Some(categories) => categories.contains(&condition_type.category()),
            None => true,
        }
    }
}

/// Export every active condition once, ordered by the lowest node it targets.
pub fn export_conditions(
    graph: &ObjectGraph,
    managers: &RuleManagers,
    filter: &ExportFilter,
) -> Vec<ConditionExport> {
    let mut seen: Vec<Arc<Condition>> = Vec::new();
    for node in managers.nodes() {
        let Some(manager) = managers.manager(node) else {
            continue;
        };
        for condition in manager.conditions(|c| filter.includes(c.condition_type())) {
            if !seen.iter().any(|s| Arc::ptr_eq(s, condition)) {
                seen.push(Arc::clone(condition));
            }
        }
    }
    seen.iter().map(|c| c.export(graph)).collect()
}

/// Export the conditions active on one node.
pub fn export_node(
    graph: &ObjectGraph,
    managers: &RuleManagers,
    node: NodeId,
    filter: &ExportFilter,
) -> Vec<ConditionExport> {
    managers
        .manager(node)
        .map(|m| {
            m.conditions(|c| filter.includes(c.condition_type()))
                .map(|c| c.export(graph))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ConditionContext;
    use crate::test_fixtures::order_graph;
    use serde_json::json;

    #[test]
    fn test_export_shape() {
        let (graph, order) = order_graph(1);
        let item = graph.list(order, "LineItems")[0];
        let mut managers = RuleManagers::new();
        let mut ctx = ConditionContext::new(&graph, &mut managers);
        let t = ConditionType::warning("Order.Qty", "Check quantities.").build();
        t.when(&mut ctx, order, || true, &["LineItems.Quantity"]).unwrap();

        let exports = export_conditions(&graph, &managers, &ExportFilter::all());
        assert_eq!(exports.len(), 1);
        let value = serde_json::to_value(&exports[0]).unwrap();
        assert_eq!(
            value,
            json!({
                "conditionTypeCode": "Order.Qty",
                "category": "Warning",
                "message": "Check quantities.",
                "targets": [
                    { "nodeReference": { "type": "Order", "id": order.0 }, "properties": ["LineItems"] },
                    { "nodeReference": { "type": "LineItem", "id": item.0 }, "properties": ["Quantity"] }
                ]
            })
        );

        assert_eq!(export_node(&graph, &managers, item, &ExportFilter::all()).len(), 1);
    }

    #[test]
    fn test_filter_honours_always_serialize() {
        let (graph, order) = order_graph(0);
        let mut managers = RuleManagers::new();
        let mut ctx = ConditionContext::new(&graph, &mut managers);
        let info = ConditionType::info("Order.Draft", "Draft").build();
        let pinned = ConditionType::info("Order.Locked", "Locked").always_serialize(true).build();
        let error = ConditionType::error("Order.Bad", "Bad").build();
        for t in [&info, &pinned, &error] {
            t.when(&mut ctx, order, || true, &["Number"]).unwrap();
        }

        let filter = ExportFilter::only([ConditionCategory::Error]);
        let codes: Vec<String> = export_conditions(&graph, &managers, &filter)
            .into_iter()
            .map(|e| e.condition_type_code)
            .collect();
        assert_eq!(codes, vec!["Order.Locked".to_string(), "Order.Bad".to_string()]);
    }
}
