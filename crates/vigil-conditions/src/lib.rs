//! Derived conditions over a live object graph.
//!
//! A [`ConditionType`] describes a kind of condition: a code, a category and a
//! message. A [`Condition`] is one live instance of a type, attached to a node
//! and to the node/property pairs ("targets") that explain it. Every node a
//! condition targets has a [`RuleManager`] that indexes the condition by type,
//! so a UI can ask what is wrong with a given node or property.
//!
//! Conditions are reconciled, not accumulated: each evaluation of a type on a
//! node either creates, updates or destroys the single condition of that type
//! owned by the node.
//!
//! ## Core Concepts
//!
//! - **ConditionType**: code, [`ConditionCategory`], localizable message and an
//!   optional [`GoverningRule`] that decides when the condition applies
//! - **Condition**: an active instance with its message and targets
//! - **RuleManagers**: per-node indexes of the conditions targeting each node
//! - **Rule / RuleSet**: what to evaluate on which node, and when
//! - **PropertyRule**: ready-made rules over one property (required, length,
//!   range, allowed values, custom validation)
//!
//! ## Reconciliation
//!
//! ```text
//! applies   existing   outcome
//! true      none       create and attach to the target paths
//! true      some       refresh the message (and, if configured, the targets)
//! false     some       destroy, detaching from every target
//! false     none       nothing
//! ```

mod category;
mod condition;
mod condition_type;
pub mod config;
mod error;
mod export;
mod expression;
mod governing;
mod inference;
mod manager;
mod registry;
mod resources;
mod rule;
pub mod rules;

#[cfg(test)]
mod test_fixtures;

pub use category::{ConditionCategory, ConditionTypeSet};
pub use condition::{Condition, ConditionTarget};
pub use condition_type::{ConditionType, ConditionTypeBuilder, Translator};
pub use error::{ConditionError, ConditionResult};
pub use expression::ModelExpression;
pub use governing::GoverningRule;
pub use inference::{ExplicitDependencies, Predicate, PredicateInference, SourceInference};
pub use manager::{ConditionContext, RuleManager, RuleManagers};
pub use registry::ConditionTypeRegistry;
pub use resources::{ResourceDocument, ResourceTable, DEFAULT_LOCALE};
pub use rule::{ConditionRule, InvocationType, Rule, RuleId, RuleSet, RunSummary};

// Configuration
pub use config::{EngineConfig, RuleSetConfig};

// Export
pub use export::{export_conditions, export_node, ConditionExport, ExportFilter, NodeReference, TargetExport};

// Property rules
pub use rules::{
    AllowedValues, AllowedValuesRule, PropertyRule, RangeRule, RequiredRule, StringLengthRule,
    ValidationMessage, ValidationRule,
};
