//! Error types for the object-graph model.

use thiserror::Error;

use crate::NodeId;

/// Result type alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while building or querying an object graph.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A type referenced by name is not part of the schema.
    #[error("unknown type: {name}")]
    UnknownType { name: String },

    /// A type with the same name was already added to the schema.
    #[error("duplicate type: {name}")]
    DuplicateType { name: String },

    /// A property referenced by name is not declared on the type.
    #[error("unknown property {property} on type {type_name}")]
    UnknownProperty { type_name: String, property: String },

    /// A node referenced by ID was not found in the graph.
    #[error("node not found: {node_id}")]
    NodeNotFound { node_id: NodeId },

    /// A node with the same ID already exists.
    #[error("duplicate node: {node_id}")]
    DuplicateNode { node_id: NodeId },

    /// A value operation targeted a relationship property.
    #[error("{type_name}.{property} is a relationship, not a value")]
    NotAValue { type_name: String, property: String },

    /// A relationship operation targeted a value property, or the wrong cardinality.
    #[error("{type_name}.{property} is not a {expected} relationship")]
    NotARelationship {
        type_name: String,
        property: String,
        expected: &'static str,
    },

    /// A reference pointed at a node of the wrong type.
    #[error("type mismatch for {property}: expected {expected}, found {found}")]
    TypeMismatch {
        property: String,
        expected: String,
        found: String,
    },

    /// A path expression could not be parsed.
    #[error("invalid path '{path}' at {position}: {message}")]
    PathSyntax {
        path: String,
        position: usize,
        message: String,
    },

    /// A graph document could not be decoded.
    #[error("document error: {0}")]
    Document(#[from] serde_json::Error),
}

impl ModelError {
    pub fn unknown_property(type_name: impl Into<String>, property: impl Into<String>) -> Self {
        Self::UnknownProperty {
            type_name: type_name.into(),
            property: property.into(),
        }
    }

    pub fn path_syntax(path: &str, position: usize, message: impl Into<String>) -> Self {
        Self::PathSyntax {
            path: path.to_string(),
            position,
            message: message.into(),
        }
    }
}
