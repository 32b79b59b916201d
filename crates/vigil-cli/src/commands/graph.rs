//! Graph command implementation.
//!
//! Prints node and relationship counts of a graph document, and whether its
//! relationships form cycles (path expansion stops at revisited nodes).

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use petgraph::algo::{is_cyclic_directed, kosaraju_scc};

use super::load_graph;

/// Structure of a loaded graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphSummary {
    pub nodes: usize,
    pub edges: usize,
    pub nodes_by_type: BTreeMap<String, usize>,
    pub edges_by_property: BTreeMap<String, usize>,
    pub cyclic: bool,
    /// Strongly connected groups of more than one node.
    pub cycle_groups: usize,
}

pub fn execute(path: &Path) -> Result<GraphSummary> {
    let graph = load_graph(path)?;
    let (pg, _) = graph.to_petgraph();

    let mut summary = GraphSummary {
        nodes: pg.node_count(),
        edges: pg.edge_count(),
        cyclic: is_cyclic_directed(&pg),
        cycle_groups: kosaraju_scc(&pg).iter().filter(|scc| scc.len() > 1).count(),
        ..GraphSummary::default()
    };
    for node in graph.nodes() {
        *summary.nodes_by_type.entry(node.type_name.clone()).or_default() += 1;
    }
    for property in pg.edge_weights() {
        *summary.edges_by_property.entry(property.clone()).or_default() += 1;
    }

    println!("Graph: {}", path.display());
    println!("   Nodes: {}", summary.nodes);
    for (type_name, count) in &summary.nodes_by_type {
        println!("      {type_name}: {count}");
    }
    println!("   Edges: {}", summary.edges);
    for (property, count) in &summary.edges_by_property {
        println!("      {property}: {count}");
    }
    println!(
        "   Cycles: {}",
        if summary.cyclic {
            format!("yes ({} group(s))", summary.cycle_groups)
        } else {
            "no".to_string()
        }
    );

    Ok(summary)
}
