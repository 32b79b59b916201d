//! Property rules.
//!
//! A property rule checks one property of one model type and owns a single
//! error condition attached to that property. Its code is
//! `"<Type>.<Property>.<Rule>"`.

mod allowed;
mod length;
mod range;
mod required;
mod validation;

use std::sync::Arc;

use serde_json::Value;
use vigil_model::{NodeId, ObjectGraph, PropertyDef, Schema};

use crate::condition::Condition;
use crate::condition_type::ConditionType;
use crate::error::ConditionResult;
use crate::manager::ConditionContext;
use crate::resources::ResourceTable;
use crate::rule::{InvocationType, Rule, RuleId};

pub use allowed::{AllowedValues, AllowedValuesRule};
pub use length::StringLengthRule;
pub use range::RangeRule;
pub use required::RequiredRule;
pub use validation::{ValidationMessage, ValidationRule};

/// Produces the display name of a property. Called only when a message is built.
pub type Label = Arc<dyn Fn() -> String + Send + Sync>;

/// Renders a bound or value for messages.
pub type ValueFormat = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// A rule over one property of one model type.
pub trait PropertyRule: Send + Sync {
    /// Short rule name, the last segment of the code.
    fn rule_name(&self) -> &str;

    fn binding(&self) -> &PropertyBinding;

    fn condition_type(&self) -> &Arc<ConditionType>;

    fn invocation_type(&self) -> InvocationType {
        InvocationType::INIT_NEW | InvocationType::PROPERTY_CHANGED
    }

    /// Properties or paths that re-run the rule.
    fn dependencies(&self) -> Vec<String> {
        vec![self.binding().property_name().to_string()]
    }

    /// Whether the property currently violates the rule.
    fn condition_applies(&self, graph: &ObjectGraph, node: NodeId) -> ConditionResult<bool>;

    /// Message for a violation. Only called when the condition applies.
    fn violation_message(&self, _graph: &ObjectGraph, _node: NodeId) -> ConditionResult<String> {
        Ok(self.condition_type().message())
    }
}

impl<T: PropertyRule> Rule for T {
    fn id(&self) -> RuleId {
        RuleId::new(self.condition_type().code().unwrap_or_default())
    }

    fn root_type(&self) -> &str {
        self.binding().root_type()
    }

    fn invocation(&self) -> InvocationType {
        self.invocation_type()
    }

    fn predicates(&self) -> Vec<String> {
        self.dependencies()
    }

    fn condition_types(&self) -> Vec<Arc<ConditionType>> {
        vec![Arc::clone(self.condition_type())]
    }

    fn invoke(&self, ctx: &mut ConditionContext<'_>, node: NodeId) -> ConditionResult<Option<Arc<Condition>>> {
        let graph = ctx.graph();
        let applies = self.condition_applies(graph, node)?;
        let message = if applies {
            self.violation_message(graph, node)?
        } else {
            String::new()
        };
        let property = self.binding().property_name();
        self.condition_type()
            .when_with_message(ctx, &message, node, || applies, &[property])
    }
}

/// The property a rule is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyBinding {
    root_type: String,
    property: PropertyDef,
}

impl PropertyBinding {
    /// Bind to `root_type.property`, failing when the schema lacks either.
    pub fn new(schema: &Schema, root_type: &str, property: &str) -> ConditionResult<Self> {
        let property = schema.property(root_type, property)?.clone();
        Ok(Self {
            root_type: root_type.to_string(),
            property,
        })
    }

    pub fn root_type(&self) -> &str {
        &self.root_type
    }

    pub fn property(&self) -> &PropertyDef {
        &self.property
    }

    pub fn property_name(&self) -> &str {
        &self.property.name
    }

    /// Error code for a rule on this property.
    pub fn code(&self, rule_name: &str) -> String {
        format!("{}.{}.{}", self.root_type, self.property.name, rule_name)
    }
}

/// Label derived from a property name: `"FirstName"` becomes `"First Name"`.
pub fn default_label(property: &str) -> Label {
    let text = split_camel_case(property);
    Arc::new(move || text.clone())
}

/// A fixed label.
pub fn fixed_label(text: impl Into<String>) -> Label {
    let text = text.into();
    Arc::new(move || text.clone())
}

/// Strings unquoted, everything else as JSON.
pub fn default_format() -> ValueFormat {
    Arc::new(|value| match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Insert spaces at word boundaries of a camel-case name.
pub fn split_camel_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_lower) {
                out.push(' ');
            }
        }
        out.push(c);
    }
    out
}

/// Build the condition type of a property rule.
///
/// `substitute` fills placeholders after any resource lookup, on every read.
pub(crate) fn property_condition_type(
    code: String,
    template: &str,
    resources: Option<Arc<ResourceTable>>,
    substitute: impl Fn(&str) -> String + Send + Sync + 'static,
) -> Arc<ConditionType> {
    let builder = ConditionType::error(code, template).translator(substitute);
    match resources {
        Some(table) => builder.resources(table).build(),
        None => builder.build(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::order_schema;

    #[test]
    fn test_split_camel_case() {
        assert_eq!(split_camel_case("FirstName"), "First Name");
        assert_eq!(split_camel_case("Total"), "Total");
        assert_eq!(split_camel_case("PromoCode"), "Promo Code");
        assert_eq!(split_camel_case("HTMLParser"), "HTML Parser");
        assert_eq!(split_camel_case("lineItems"), "line Items");
    }

    #[test]
    fn test_binding_code() {
        let binding = PropertyBinding::new(&order_schema(), "Order", "Number").unwrap();
        assert_eq!(binding.code("Required"), "Order.Number.Required");
        assert_eq!(binding.property().declaring_type, "Order");
    }

    #[test]
    fn test_binding_rejects_unknown_property() {
        assert!(PropertyBinding::new(&order_schema(), "Order", "Nope").is_err());
    }

    #[test]
    fn test_default_format() {
        let format = default_format();
        assert_eq!(format(&Value::from("abc")), "abc");
        assert_eq!(format(&Value::from(2.5)), "2.5");
    }
}
