use std::sync::Arc;

use vigil_model::{NodeId, ObjectGraph, Schema};

use super::{default_label, property_condition_type, Label, PropertyBinding, PropertyRule};
use crate::condition_type::ConditionType;
use crate::error::ConditionResult;
use crate::resources::ResourceTable;
use crate::rule::InvocationType;

const TEMPLATE: &str = "{property} is required.";

/// A property must have a value; a to-many relationship must have at least one member.
pub struct RequiredRule {
    binding: PropertyBinding,
    label: Label,
    resources: Option<Arc<ResourceTable>>,
    invocation: InvocationType,
    condition_type: Arc<ConditionType>,
}

impl RequiredRule {
    pub fn new(schema: &Schema, root_type: &str, property: &str) -> ConditionResult<Self> {
        let binding = PropertyBinding::new(schema, root_type, property)?;
        let label = default_label(binding.property_name());
        let condition_type = Self::build_type(&binding, &label, None);
        Ok(Self {
            binding,
            label,
            resources: None,
            invocation: InvocationType::INIT_NEW | InvocationType::PROPERTY_CHANGED,
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

    pub fn with_invocation(mut self, invocation: InvocationType) -> Self {
        self.invocation = invocation;
        self
    }

    fn rebuild(mut self) -> Self {
        self.condition_type = Self::build_type(&self.binding, &self.label, self.resources.clone());
        self
    }

    fn build_type(
        binding: &PropertyBinding,
        label: &Label,
        resources: Option<Arc<ResourceTable>>,
    ) -> Arc<ConditionType> {
        let label = Arc::clone(label);
        property_condition_type(binding.code("Required"), TEMPLATE, resources, move |text| {
            text.replace("{property}", &label())
        })
    }
}

impl PropertyRule for RequiredRule {
    fn rule_name(&self) -> &str {
        "Required"
    }

    fn binding(&self) -> &PropertyBinding {
        &self.binding
    }

    fn condition_type(&self) -> &Arc<ConditionType> {
        &self.condition_type
    }

    fn invocation_type(&self) -> InvocationType {
        self.invocation
    }

    fn condition_applies(&self, graph: &ObjectGraph, node: NodeId) -> ConditionResult<bool> {
        let property = self.binding.property();
        if property.is_list() {
            Ok(graph.list(node, &property.name).is_empty())
        } else {
            Ok(graph.is_unset(node, &property.name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{ConditionContext, RuleManagers};
    use crate::rule::Rule;
    use crate::rules::fixed_label;
    use crate::test_fixtures::{order_graph, order_schema};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_required_value() {
        let (mut graph, order) = order_graph(1);
        let rule = RequiredRule::new(&order_schema(), "Order", "PromoCode").unwrap();
        let mut managers = RuleManagers::new();

        let mut ctx = ConditionContext::new(&graph, &mut managers);
        let c = rule.invoke(&mut ctx, order).unwrap().unwrap();
        assert_eq!(c.condition_type().code(), Some("Order.PromoCode.Required"));
        assert_eq!(&*c.message(), "Promo Code is required.");
        assert_eq!(c.target(order).unwrap().properties(), ["PromoCode"]);

        graph.set_value(order, "PromoCode", Value::Null).unwrap();
        let mut ctx = ConditionContext::new(&graph, &mut managers);
        assert!(rule.invoke(&mut ctx, order).unwrap().is_some());

        graph.set_value(order, "PromoCode", "SPRING").unwrap();
        let mut ctx = ConditionContext::new(&graph, &mut managers);
        assert!(rule.invoke(&mut ctx, order).unwrap().is_none());
        assert!(managers.is_empty());
    }

    #[test]
    fn test_required_list_and_reference() {
        let (graph, order) = order_graph(0);
        let items = RequiredRule::new(&order_schema(), "Order", "LineItems").unwrap();
        let customer = RequiredRule::new(&order_schema(), "Order", "Customer").unwrap();
        let mut managers = RuleManagers::new();
        let mut ctx = ConditionContext::new(&graph, &mut managers);

        assert!(items.invoke(&mut ctx, order).unwrap().is_some());
        assert!(customer.invoke(&mut ctx, order).unwrap().is_some());
    }

    #[test]
    fn test_label_is_lazy() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let rule = RequiredRule::new(&order_schema(), "Order", "Number")
            .unwrap()
            .with_label(Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                "Order number".to_string()
            }));

        let (graph, order) = order_graph(0);
        let mut managers = RuleManagers::new();
        let mut ctx = ConditionContext::new(&graph, &mut managers);

        // Number is set, so no message is built
        assert!(rule.invoke(&mut ctx, order).unwrap().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(rule.condition_type().message(), "Order number is required.");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resources_then_label() {
        let table = Arc::new(
            ResourceTable::new("m").with_entry("fr", TEMPLATE, "{property} est obligatoire."),
        );
        table.set_locale("fr");
        let rule = RequiredRule::new(&order_schema(), "Order", "Number")
            .unwrap()
            .with_label(fixed_label("Numéro"))
            .with_resources(table);

        assert_eq!(rule.condition_type().message(), "Numéro est obligatoire.");
    }
}
