//! Registry of condition types.
//!
//! The registry is the single place codes are resolved back to their types.
//! It also records which model types own which condition types, and which
//! resource table localizes the messages of a model type.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::condition_type::{compose, ConditionType};
use crate::error::{ConditionError, ConditionResult};
use crate::resources::ResourceTable;

/// Condition types by code.
#[derive(Default)]
pub struct ConditionTypeRegistry {
    types: BTreeMap<String, Arc<ConditionType>>,
    by_model_type: HashMap<String, Vec<Arc<ConditionType>>>,
    resources: HashMap<String, Arc<ResourceTable>>,
}

impl ConditionTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type. Its code must be assigned and unused.
    pub fn register(&mut self, condition_type: Arc<ConditionType>) -> ConditionResult<()> {
        let code = condition_type.require_code()?.to_string();
        if self.types.contains_key(&code) {
            return Err(ConditionError::DuplicateCode { code });
        }
        debug!(code = %code, category = %condition_type.category(), "Condition type registered");
        self.types.insert(code, condition_type);
        Ok(())
    }

    /// Register a type owned by `model_type`.
    ///
    /// Registering the same instance again only records the ownership.
    pub fn register_for(&mut self, model_type: &str, condition_type: Arc<ConditionType>) -> ConditionResult<()> {
        let code = condition_type.require_code()?;
        let registered = self
            .types
            .get(code)
            .is_some_and(|existing| Arc::ptr_eq(existing, &condition_type));
        if !registered {
            self.register(Arc::clone(&condition_type))?;
        }
        let owned = self.by_model_type.entry(model_type.to_string()).or_default();
        if !owned.iter().any(|t| Arc::ptr_eq(t, &condition_type)) {
            owned.push(condition_type);
        }
        Ok(())
    }

    /// Register a type declared as `member` of `declaring_type`.
    ///
    /// An unset code is sealed as `"<declaring_type>.<member>"`. When the type
    /// has no translator and a resource table is mapped for the declaring type,
    /// the table becomes its translator.
    pub fn register_member(
        &mut self,
        condition_type: Arc<ConditionType>,
        declaring_type: &str,
        member: &str,
    ) -> ConditionResult<()> {
        if condition_type.code().is_none() {
            condition_type.seal_code(format!("{declaring_type}.{member}"))?;
        }
        if !condition_type.has_translator() {
            if let Some(table) = self.resources.get(declaring_type) {
                condition_type.install_translator(compose(Arc::clone(table), None));
            }
        }
        self.register_for(declaring_type, condition_type)
    }

    /// The registered type with `code`.
    pub fn lookup(&self, code: &str) -> Option<Arc<ConditionType>> {
        self.types.get(code).cloned()
    }

    /// Types owned by `model_type`, in registration order.
    pub fn condition_types_for(&self, model_type: &str) -> &[Arc<ConditionType>] {
        self.by_model_type
            .get(model_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Localize the messages of `source_types` with `table`. Later mappings win.
    pub fn map_resources<I, S>(&mut self, source_types: I, table: Arc<ResourceTable>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for source in source_types {
            self.resources.insert(source.into(), Arc::clone(&table));
        }
    }

    pub fn resources_for(&self, source_type: &str) -> Option<Arc<ResourceTable>> {
        self.resources.get(source_type).cloned()
    }

    /// All registered types, ordered by code.
    pub fn types(&self) -> impl Iterator<Item = &Arc<ConditionType>> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl fmt::Debug for ConditionTypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionTypeRegistry")
            .field("type_count", &self.types.len())
            .field("codes", &self.types.keys().collect::<Vec<_>>())
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::ConditionCategory;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ConditionTypeRegistry::new();
        let t = ConditionType::error("Order.NoItems", "No items").build();
        registry.register(Arc::clone(&t)).unwrap();

        let found = registry.lookup("Order.NoItems").unwrap();
        assert!(Arc::ptr_eq(&found, &t));
        assert!(registry.lookup("Order.Missing").is_none());
    }

    #[test]
    fn test_duplicate_code_fails() {
        let mut registry = ConditionTypeRegistry::new();
        registry
            .register(ConditionType::error("Order.NoItems", "a").build())
            .unwrap();
        let err = registry
            .register(ConditionType::warning("Order.NoItems", "b").build())
            .unwrap_err();
        assert!(matches!(err, ConditionError::DuplicateCode { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unsealed_code_fails() {
        let mut registry = ConditionTypeRegistry::new();
        let t = ConditionType::builder(ConditionCategory::Warning, "w").build();
        assert!(matches!(
            registry.register(t),
            Err(ConditionError::UnsealedCode { .. })
        ));
    }

    #[test]
    fn test_register_member_seals_and_translates() {
        let mut registry = ConditionTypeRegistry::new();
        let table = Arc::new(ResourceTable::new("orders").with_entry("en", "empty", "The order is empty."));
        registry.map_resources(["Order", "Invoice"], table);

        let t = ConditionType::builder(ConditionCategory::Error, "empty").build();
        registry.register_member(Arc::clone(&t), "Order", "Empty").unwrap();

        assert_eq!(t.code(), Some("Order.Empty"));
        assert_eq!(t.message(), "The order is empty.");
        assert_eq!(registry.condition_types_for("Order").len(), 1);
        assert!(registry.condition_types_for("Invoice").is_empty());
    }

    #[test]
    fn test_register_member_keeps_existing_code_and_translator() {
        let mut registry = ConditionTypeRegistry::new();
        registry.map_resources(["Order"], Arc::new(ResourceTable::new("orders")));

        let t = ConditionType::error("Custom.Code", "raw")
            .translator(|s| s.to_uppercase())
            .build();
        registry.register_member(Arc::clone(&t), "Order", "Other").unwrap();

        assert_eq!(t.code(), Some("Custom.Code"));
        assert_eq!(t.message(), "RAW");
        assert!(registry.lookup("Custom.Code").is_some());
    }

    #[test]
    fn test_last_resource_mapping_wins() {
        let mut registry = ConditionTypeRegistry::new();
        registry.map_resources(["Order"], Arc::new(ResourceTable::new("first")));
        registry.map_resources(["Order"], Arc::new(ResourceTable::new("second")));

        assert_eq!(registry.resources_for("Order").unwrap().name(), "second");
        assert!(registry.resources_for("LineItem").is_none());
    }

    #[test]
    fn test_register_for_is_idempotent_per_instance() {
        let mut registry = ConditionTypeRegistry::new();
        let t = ConditionType::error("Order.A", "a").build();
        registry.register_for("Order", Arc::clone(&t)).unwrap();
        registry.register_for("Order", Arc::clone(&t)).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.condition_types_for("Order").len(), 1);
    }
}
