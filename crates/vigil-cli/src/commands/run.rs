//! Run command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use vigil_conditions::{
    export_conditions, ConditionCategory, ConditionContext, ConditionExport, ConditionTypeRegistry,
    ExportFilter, InvocationType, RuleManagers, RuleSetConfig,
};

use super::load_graph;

/// Options of the run command.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Categories to export; empty exports all.
    pub categories: Vec<ConditionCategory>,
    pub locale: Option<String>,
    pub pretty: bool,
    pub strict: bool,
}

/// Evaluate every rule of the rule set against every node of the graph as a
/// newly created node, then write out the active conditions as JSON.
pub fn execute(
    graph_path: &Path,
    rules_path: &Path,
    output: Option<&Path>,
    options: &RunOptions,
) -> Result<Vec<ConditionExport>> {
    let graph = load_graph(graph_path)?;

    let json = std::fs::read_to_string(rules_path)
        .with_context(|| format!("Failed to read rule set {}", rules_path.display()))?;
    let config = RuleSetConfig::from_json(&json)
        .with_context(|| format!("Invalid rule set {}", rules_path.display()))?;

    let mut registry = ConditionTypeRegistry::new();
    let rules = config.build(graph.schema(), &mut registry)?;

    if let Some(locale) = &options.locale {
        for source_type in config.resources.iter().flat_map(|d| &d.source_types) {
            if let Some(table) = registry.resources_for(source_type) {
                table.set_locale(locale.as_str());
            }
        }
    }

    let mut managers = RuleManagers::new();
    let mut ctx = ConditionContext::new(&graph, &mut managers).with_config(config.engine);
    let summary = rules.run_all(&mut ctx, InvocationType::INIT_NEW)?;
    info!(
        nodes = graph.node_count(),
        rules = rules.len(),
        invoked = summary.invoked,
        active = summary.active,
        "Rule set evaluated"
    );

    let filter = if options.categories.is_empty() {
        ExportFilter::all()
    } else {
        ExportFilter::only(options.categories.iter().copied())
    };
    let exports = export_conditions(&graph, &managers, &filter);

    let json = if options.pretty {
        serde_json::to_string_pretty(&exports)?
    } else {
        serde_json::to_string(&exports)?
    };
    match output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), conditions = exports.len(), "Conditions written");
        }
        None => println!("{json}"),
    }

    if options.strict {
        let errors = exports
            .iter()
            .filter(|e| e.category == ConditionCategory::Error)
            .count();
        if errors > 0 {
            anyhow::bail!("{errors} error condition(s) active");
        }
    }

    Ok(exports)
}
