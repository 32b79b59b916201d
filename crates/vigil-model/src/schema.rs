//! Model types and the properties they declare.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// A property declared on a [`ModelType`].
///
/// Value properties hold a JSON scalar. Reference properties point at nodes of
/// `reference` type, either one (`list == false`) or many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    /// Property name, unique within the declaring type.
    pub name: String,

    /// Name of the type that declares this property.
    #[serde(default)]
    pub declaring_type: String,

    /// Target type for relationship properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    /// Whether a relationship property is to-many.
    #[serde(default)]
    pub list: bool,
}

impl PropertyDef {
    /// Create a value property.
    pub fn value(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaring_type: String::new(),
            reference: None,
            list: false,
        }
    }

    /// Create a to-one relationship property.
    pub fn reference(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            reference: Some(target.into()),
            ..Self::value(name)
        }
    }

    /// Create a to-many relationship property.
    pub fn list(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            list: true,
            ..Self::reference(name, target)
        }
    }

    /// Whether this property relates to other nodes.
    pub fn is_relationship(&self) -> bool {
        self.reference.is_some()
    }

    /// Whether this property is a to-many relationship.
    pub fn is_list(&self) -> bool {
        self.is_relationship() && self.list
    }

    /// Target type of a relationship property.
    pub fn target_type(&self) -> Option<&str> {
        self.reference.as_deref()
    }
}

/// A node type and its declared properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelType {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
}

impl ModelType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    /// Declare a property (builder pattern).
    pub fn with_property(mut self, property: PropertyDef) -> Self {
        self.declare(property);
        self
    }

    /// Declare a value property (builder pattern).
    pub fn with_value(self, name: impl Into<String>) -> Self {
        self.with_property(PropertyDef::value(name))
    }

    /// Declare a to-one relationship (builder pattern).
    pub fn with_reference(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.with_property(PropertyDef::reference(name, target))
    }

    /// Declare a to-many relationship (builder pattern).
    pub fn with_list(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.with_property(PropertyDef::list(name, target))
    }

    /// Declare a property, replacing any earlier declaration with the same name.
    pub fn declare(&mut self, mut property: PropertyDef) {
        property.declaring_type = self.name.clone();
        match self.properties.iter_mut().find(|p| p.name == property.name) {
            Some(existing) => *existing = property,
            None => self.properties.push(property),
        }
    }

    /// Look up a property by name.
    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Whether the type declares a property with the given name.
    pub fn has_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    /// Names of all declared properties, in declaration order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.name.as_str())
    }
}

/// The set of model types a graph may contain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    types: BTreeMap<String, ModelType>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a type (builder pattern).
    pub fn with_type(mut self, model_type: ModelType) -> ModelResult<Self> {
        self.add(model_type)?;
        Ok(self)
    }

    /// Add a type. Fails if a type with the same name exists.
    pub fn add(&mut self, mut model_type: ModelType) -> ModelResult<()> {
        if self.types.contains_key(&model_type.name) {
            return Err(ModelError::DuplicateType {
                name: model_type.name,
            });
        }
        for property in &mut model_type.properties {
            property.declaring_type = model_type.name.clone();
        }
        self.types.insert(model_type.name.clone(), model_type);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ModelType> {
        self.types.get(name)
    }

    /// Look up a type, failing when it is not part of the schema.
    pub fn require(&self, name: &str) -> ModelResult<&ModelType> {
        self.types.get(name).ok_or_else(|| ModelError::UnknownType {
            name: name.to_string(),
        })
    }

    /// Look up a property of a type, failing when either is unknown.
    pub fn property(&self, type_name: &str, property: &str) -> ModelResult<&PropertyDef> {
        self.require(type_name)?
            .property(property)
            .ok_or_else(|| ModelError::unknown_property(type_name, property))
    }

    pub fn types(&self) -> impl Iterator<Item = &ModelType> {
        self.types.values()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaring_type_is_assigned() {
        let order = ModelType::new("Order")
            .with_value("Number")
            .with_list("LineItems", "LineItem");

        let items = order.property("LineItems").unwrap();
        assert_eq!(items.declaring_type, "Order");
        assert!(items.is_relationship());
        assert!(items.is_list());
        assert_eq!(items.target_type(), Some("LineItem"));

        let number = order.property("Number").unwrap();
        assert!(!number.is_relationship());
        assert!(!number.is_list());
    }

    #[test]
    fn test_redeclare_replaces_property() {
        let mut t = ModelType::new("Person").with_value("Name");
        t.declare(PropertyDef::reference("Name", "Text"));

        assert_eq!(t.properties.len(), 1);
        assert!(t.property("Name").unwrap().is_relationship());
    }

    #[test]
    fn test_schema_rejects_duplicate_types() {
        let mut schema = Schema::new();
        schema.add(ModelType::new("Order")).unwrap();

        let err = schema.add(ModelType::new("Order")).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateType { .. }));
    }

    #[test]
    fn test_schema_property_lookup() {
        let schema = Schema::new()
            .with_type(ModelType::new("Order").with_value("Number"))
            .unwrap();

        assert!(schema.property("Order", "Number").is_ok());
        assert!(matches!(
            schema.property("Order", "Missing"),
            Err(ModelError::UnknownProperty { .. })
        ));
        assert!(matches!(
            schema.property("Missing", "Number"),
            Err(ModelError::UnknownType { .. })
        ));
    }

    #[test]
    fn test_list_flag_ignored_for_values() {
        let json = r#"{ "name": "Tags", "list": true }"#;
        let property: PropertyDef = serde_json::from_str(json).unwrap();
        assert!(!property.is_list());
    }
}
