//! Integration tests for the vigil CLI.
//!
//! Run with: `cargo test --package vigil-cli --test cli_integration`

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

/// Helper to run the vigil CLI with given arguments.
fn run_vigil(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_vigil"))
        .args(args)
        .output()
        .expect("Failed to execute vigil command")
}

const GRAPH: &str = r#"{
    "types": [
        { "name": "Order", "properties": [
            { "name": "Number" },
            { "name": "LineItems", "reference": "LineItem", "list": true }
        ] },
        { "name": "LineItem", "properties": [
            { "name": "Quantity" },
            { "name": "Order", "reference": "Order" }
        ] }
    ],
    "nodes": [
        { "id": 1, "type": "Order", "properties": { "LineItems": [2, 3] } },
        { "id": 2, "type": "LineItem", "properties": { "Quantity": 0, "Order": 1 } },
        { "id": 3, "type": "LineItem", "properties": { "Quantity": 4, "Order": 1 } }
    ]
}"#;

const RULES: &str = r#"{
    "resources": [
        { "name": "orders", "source_types": ["Order", "LineItem"],
          "entries": {
            "en": { "{property} is required.": "{property} is required." },
            "fr": { "{property} is required.": "{property} est obligatoire." }
          } }
    ],
    "condition_types": [
        { "model_type": "Order", "name": "Review", "category": "Info", "message": "Needs review." }
    ],
    "properties": {
        "Order": { "Number": { "required": true, "label": "Order number" } },
        "LineItem": { "Quantity": { "range": { "min": 1 } } }
    }
}"#;

/// Write the graph and rule documents into a temp dir.
fn write_inputs(dir: &Path) -> (PathBuf, PathBuf) {
    let graph = dir.join("graph.json");
    let rules = dir.join("rules.json");
    fs::write(&graph, GRAPH).unwrap();
    fs::write(&rules, RULES).unwrap();
    (graph, rules)
}

fn conditions(output: &Output) -> Vec<Value> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    match serde_json::from_str::<Value>(stdout.trim()).unwrap() {
        Value::Array(items) => items,
        other => panic!("expected an array, got {other}"),
    }
}

fn codes(conditions: &[Value]) -> Vec<&str> {
    conditions
        .iter()
        .map(|c| c["conditionTypeCode"].as_str().unwrap())
        .collect()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

#[test]
fn test_help() {
    let output = run_vigil(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("run"));
    assert!(stdout.contains("graph"));
}

#[test]
fn test_run_requires_arguments() {
    let output = run_vigil(&["run"]);
    assert!(!output.status.success());
}

// =============================================================================
// Run Command Tests
// =============================================================================

#[test]
fn test_run_prints_conditions() {
    let temp = TempDir::new().unwrap();
    let (graph, rules) = write_inputs(temp.path());

    let output = run_vigil(&["run", "-g", graph.to_str().unwrap(), "-r", rules.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let conditions = conditions(&output);
    assert_eq!(
        codes(&conditions),
        vec!["Order.Number.Required", "LineItem.Quantity.Range"]
    );
    assert_eq!(conditions[0]["message"], "Order number is required.");
    assert_eq!(conditions[0]["targets"][0]["nodeReference"]["type"], "Order");
    assert_eq!(conditions[1]["message"], "Quantity must be at least 1.");
    assert_eq!(conditions[1]["targets"][0]["nodeReference"]["id"], 2);
    assert_eq!(conditions[1]["targets"][0]["properties"][0], "Quantity");
}

#[test]
fn test_run_with_locale() {
    let temp = TempDir::new().unwrap();
    let (graph, rules) = write_inputs(temp.path());

    let output = run_vigil(&[
        "run",
        "-g",
        graph.to_str().unwrap(),
        "-r",
        rules.to_str().unwrap(),
        "--locale",
        "fr",
    ]);
    assert!(output.status.success());
    let conditions = conditions(&output);
    assert_eq!(conditions[0]["message"], "Order number est obligatoire.");
}

#[test]
fn test_run_category_filter_and_output_file() {
    let temp = TempDir::new().unwrap();
    let (graph, rules) = write_inputs(temp.path());
    let out = temp.path().join("conditions.json");

    let output = run_vigil(&[
        "run",
        "-g",
        graph.to_str().unwrap(),
        "-r",
        rules.to_str().unwrap(),
        "--category",
        "warning",
        "-o",
        out.to_str().unwrap(),
        "--pretty",
    ]);
    assert!(output.status.success());

    let written: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written, Value::Array(Vec::new()));
}

#[test]
fn test_run_strict_fails_on_errors() {
    let temp = TempDir::new().unwrap();
    let (graph, rules) = write_inputs(temp.path());

    let output = run_vigil(&[
        "run",
        "-g",
        graph.to_str().unwrap(),
        "-r",
        rules.to_str().unwrap(),
        "--strict",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("2 error condition(s) active"));
}

#[test]
fn test_run_rejects_unknown_category() {
    let temp = TempDir::new().unwrap();
    let (graph, rules) = write_inputs(temp.path());

    let output = run_vigil(&[
        "run",
        "-g",
        graph.to_str().unwrap(),
        "-r",
        rules.to_str().unwrap(),
        "--category",
        "fatal",
    ]);
    assert!(!output.status.success());
}

#[test]
fn test_run_reports_bad_rule_set() {
    let temp = TempDir::new().unwrap();
    let (graph, _) = write_inputs(temp.path());
    let rules = temp.path().join("bad.json");
    fs::write(&rules, r#"{ "properties": { "Order": { "Missing": { "required": true } } } }"#).unwrap();

    let output = run_vigil(&["run", "-g", graph.to_str().unwrap(), "-r", rules.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Missing"));
}

// =============================================================================
// Graph Command Tests
// =============================================================================

#[test]
fn test_graph_summary() {
    let temp = TempDir::new().unwrap();
    let (graph, _) = write_inputs(temp.path());

    let output = run_vigil(&["graph", "-g", graph.to_str().unwrap()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Nodes: 3"));
    assert!(stdout.contains("LineItem: 2"));
    assert!(stdout.contains("Edges: 4"));
    assert!(stdout.contains("Cycles: yes (1 group(s))"));
}

#[test]
fn test_graph_missing_file() {
    let output = run_vigil(&["graph", "-g", "/nonexistent/graph.json"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read graph document"));
}
