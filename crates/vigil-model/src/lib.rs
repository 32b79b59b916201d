//! Object-graph model shared across the Vigil workspace.
//!
//! A graph is a set of typed nodes. Each node type declares its properties up
//! front: plain values, to-one references, or to-many references. Rules and
//! conditions never own nodes; they address them through [`NodeId`].
//!
//! The [`path`] module implements the small path language used to name
//! properties on related nodes:
//!
//! ```text
//! Name                    leaf property on the root
//! Customer.Name           property reached through a to-one relation
//! LineItems{Qty,Price}    several properties reached through one relation
//! {Total,LineItems.Qty}   union group of independent paths
//! ```

mod document;
mod error;
mod graph;
pub mod path;
mod schema;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use document::{GraphDocument, NodeDocument};
pub use error::{ModelError, ModelResult};
pub use graph::{GraphNode, ObjectGraph, PropertyValue};
pub use path::{ModelPath, PathExpr, PathStep};
pub use schema::{ModelType, PropertyDef, Schema};

/// Identifier for nodes within an [`ObjectGraph`].
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
