//! Drives the `cli` binary end to end: graph lifecycle, query/explain/profile
//! via a JSON-encoded AST, schema introspection, and snapshot save/load.

use std::fs;

use assert_cmd::Command;
use serde_json::Value as Json;
use tempfile::TempDir;

fn cli() -> Command {
    Command::cargo_bin("cli").expect("cli binary built")
}

fn seed_demo(graph: &str) {
    cli()
        .args(["graph", "seed-demo", graph])
        .assert()
        .success();
}

const MATCH_NAMES_ORDERED: &str = r#"{
    "matches": [{"paths": [{"nodes": [{"var": "p", "label": "Person"}], "edges": []}], "optional": false}],
    "where_predicate": null,
    "projections": [{"type": "Prop", "var": "p", "prop": "name", "alias": null}],
    "distinct": false,
    "order_by": [{"var": "p", "prop": "name", "descending": false}],
    "skip": null,
    "limit": null,
    "then": null
}"#;

#[test]
fn graph_create_then_delete_round_trips() {
    cli().args(["graph", "create", "r1"]).assert().success();
    cli().args(["graph", "create", "r1"]).assert().failure();
    cli().args(["graph", "delete", "r1"]).assert().success();
    cli().args(["graph", "delete", "r1"]).assert().failure();
}

#[test]
fn seed_demo_then_query_returns_ordered_names_as_json() {
    seed_demo("q1");
    let output = cli()
        .args(["--format", "json", "query", "q1", "--ast", MATCH_NAMES_ORDERED])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Json = serde_json::from_slice(&output).expect("valid json");
    let rows = json["rows"].as_array().expect("rows array");
    let names: Vec<&str> = rows
        .iter()
        .map(|row| row[0]["payload"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Alice", "Bob", "Carol"]);
}

#[test]
fn query_ast_can_be_loaded_from_a_file() {
    seed_demo("q2");
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ast.json");
    fs::write(&path, MATCH_NAMES_ORDERED).unwrap();
    let output = cli()
        .args(["--format", "json", "query", "q2", "--ast"])
        .arg(format!("@{}", path.display()))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Json = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["rows"].as_array().unwrap().len(), 3);
}

#[test]
fn explain_prints_a_plan_tree_without_executing() {
    seed_demo("q3");
    let output = cli()
        .args(["explain", "q3", "--ast", MATCH_NAMES_ORDERED])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).unwrap();
    assert!(text.contains("NodeByLabelScan") || text.contains("IndexScan"));
}

#[test]
fn profile_prints_row_count_and_timings() {
    seed_demo("q4");
    let output = cli()
        .args(["profile", "q4", "--ast", MATCH_NAMES_ORDERED])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).unwrap();
    assert!(text.contains("rows_produced: 3"));
}

#[test]
fn db_labels_property_keys_and_relationship_types_report_schema() {
    seed_demo("q5");
    let labels = cli()
        .args(["--format", "json", "db", "labels", "q5"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let labels: Vec<String> = serde_json::from_slice(&labels).unwrap();
    assert!(labels.contains(&"Person".to_string()));
    assert!(labels.contains(&"Company".to_string()));

    let rel_types = cli()
        .args(["--format", "json", "db", "relationship-types", "q5"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let rel_types: Vec<String> = serde_json::from_slice(&rel_types).unwrap();
    assert!(rel_types.contains(&"KNOWS".to_string()));
    assert!(rel_types.contains(&"WORKS_AT".to_string()));

    let prop_keys = cli()
        .args(["--format", "json", "db", "property-keys", "q5"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let prop_keys: Vec<String> = serde_json::from_slice(&prop_keys).unwrap();
    assert!(prop_keys.contains(&"name".to_string()));
}

#[test]
fn snapshot_save_then_load_restores_queryable_data() {
    seed_demo("q6");
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("q6.json");

    cli()
        .args(["snapshot", "save", "q6"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());

    cli().args(["graph", "delete", "q6"]).assert().success();

    cli()
        .args(["snapshot", "load", "q6"])
        .arg(&path)
        .assert()
        .success();

    let output = cli()
        .args(["--format", "json", "query", "q6", "--ast", MATCH_NAMES_ORDERED])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Json = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["rows"].as_array().unwrap().len(), 3);
}

#[test]
fn query_against_unknown_graph_fails_with_a_nonzero_exit() {
    cli()
        .args(["query", "does-not-exist", "--ast", MATCH_NAMES_ORDERED])
        .assert()
        .failure();
}
