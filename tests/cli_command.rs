use assert_cmd::prelude::*;
use serde_json::Value;
use std::path::Path;
use std::process::Command;

const CONFIG: &str = "tests/fixtures/soulflow.yaml";

fn soulflow() -> Command {
    let bin = assert_cmd::cargo::cargo_bin!("soulflow");
    let mut cmd = Command::new(bin);
    cmd.env_remove("SOUL_FLOW_OVERRIDE_JSON")
        .env_remove("SOUL_FLOW_CLI_OVERRIDES")
        .env_remove("RUST_LOG")
        .args(["--config", CONFIG]);
    cmd
}

fn fixture(name: &str) -> String {
    let path = Path::new("tests/fixtures").join(name);
    assert!(path.exists(), "fixture missing");
    path.to_str().unwrap().to_string()
}

#[test]
fn validate_reports_node_errors() {
    let assert = soulflow()
        .args(["--output", "json", "validate", &fixture("invalid_flow.json")])
        .assert()
        .failure();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    let value: Value = serde_json::from_str(extract_json(&stdout)).expect("valid json");

    assert_eq!(value["valid"].as_bool(), Some(false));
    assert_eq!(value["nodes"]["totalErrors"].as_u64(), Some(2));
    let open = value["nodes"]["nodeErrors"]["open"].as_array().unwrap();
    assert_eq!(open[0].as_str(), Some("missing url"));
}

#[test]
fn order_falls_back_on_cycle() {
    let assert = soulflow()
        .args(["--output", "json", "order", &fixture("cyclic_graph.json")])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    let value: Value = serde_json::from_str(extract_json(&stdout)).expect("valid json");

    let ids: Vec<_> = value["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|step| step["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert!(value["cycle"]["unscheduled"].as_array().is_some());
}

#[test]
fn run_emits_report_and_dispatches() {
    let assert = soulflow()
        .args([
            "--output",
            "json",
            "run",
            &fixture("linear_flow.json"),
            "--mode",
            "hybrid",
            "--var",
            "user=\"ada\"",
        ])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    let value: Value = serde_json::from_str(extract_json(&stdout)).expect("valid json");

    let report = &value["report"];
    assert_eq!(report["status"].as_str(), Some("succeeded"));
    assert_eq!(report["mode"].as_str(), Some("hybrid"));
    assert_eq!(report["variables"]["user"].as_str(), Some("ada"));
    assert_eq!(report["steps"].as_array().unwrap().len(), 4);

    let dispatches = value["dispatches"].as_array().unwrap();
    assert_eq!(dispatches.len(), 3);
    assert_eq!(dispatches[1]["executor"].as_str(), Some("actions"));
}

#[test]
fn dry_run_lists_routes_without_executing() {
    let assert = soulflow()
        .args([
            "--output",
            "json",
            "run",
            &fixture("linear_flow.json"),
            "--mode",
            "actions",
            "--dry-run",
        ])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    let start = stdout.find('[').expect("json start");
    let end = stdout.rfind(']').expect("json end");
    let plan: Value = serde_json::from_str(&stdout[start..=end]).expect("valid json");

    let plan = plan.as_array().unwrap();
    assert_eq!(plan.len(), 4);
    assert!(plan
        .iter()
        .all(|step| step["executor"].as_str() == Some("actions")));
}

#[test]
fn convert_to_graph_chains_steps() {
    let assert = soulflow()
        .args(["convert", &fixture("linear_flow.json"), "--to", "graph"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 output");
    let value: Value = serde_json::from_str(extract_json(&stdout)).expect("valid json");

    assert_eq!(value["nodes"].as_array().unwrap().len(), 4);
    assert_eq!(value["edges"].as_array().unwrap().len(), 3);
    assert!(value["steps"].as_array().unwrap().is_empty());
}

fn extract_json(output: &str) -> &str {
    let start = output.find('{').expect("json start");
    let end = output.rfind('}').expect("json end");
    &output[start..=end]
}
