//! CLI command implementations.

pub mod graph;
pub mod run;

use std::path::Path;

use anyhow::{Context, Result};
use vigil_model::{GraphDocument, ObjectGraph};

/// Read a graph document from disk and build the graph.
pub fn load_graph(path: &Path) -> Result<ObjectGraph> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read graph document {}", path.display()))?;
    let document = GraphDocument::from_json(&json)
        .with_context(|| format!("Invalid graph document {}", path.display()))?;
    Ok(document.into_graph()?)
}
