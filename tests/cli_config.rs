//! CLI and configuration tests
//!
//! Config, plan and input files are written to a temp directory and driven
//! through the same entry points the `run` and `explain` commands use.

use std::fs;
use std::path::PathBuf;

use serde_json::json;
use tempfile::TempDir;

use gridsql::cli::{execute, explain_plan, load_config, CliErrorCode, NodeInput};
use gridsql::distributed::ExecutionPlan;
use gridsql::{EngineConfig, ErrorCode};

// =============================================================================
// Test Utilities
// =============================================================================

fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Top two rows by score, ordered at the merge node with nulls last
const TOP_SCORES_PLAN: &str = r#"{
    "input_types": ["string", "long"],
    "merge_projections": [
        {
            "type": "topn",
            "outputs": [
                {"symbol": "reference", "index": 0, "data_type": "string"},
                {"symbol": "reference", "index": 1, "data_type": "long"}
            ],
            "order_by": [
                {"symbol": {"symbol": "reference", "index": 1, "data_type": "long"}, "descending": true, "nulls_first": false}
            ],
            "limit": 2
        }
    ]
}"#;

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_partial_config_file_keeps_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "engine.json", r#"{"rows_per_request": 2, "log_level": "warn"}"#);

    let config = EngineConfig::load(&path).unwrap();

    assert_eq!(config.rows_per_request, 2);
    assert_eq!(config.log_level, "warn");
    assert_eq!(config.job_timeout_ms, EngineConfig::default().job_timeout_ms);
    assert_eq!(
        config.context_wait_timeout_ms,
        EngineConfig::default().context_wait_timeout_ms
    );
}

#[test]
fn test_unknown_config_key_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "engine.json", r#"{"rows_per_batch": 2}"#);

    let err = EngineConfig::load(&path).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ConfigError);
}

#[test]
fn test_invalid_config_maps_to_cli_config_error() {
    let dir = TempDir::new().unwrap();
    let zero = write_file(&dir, "zero.json", r#"{"max_concurrent_shards": 0}"#);
    let level = write_file(&dir, "level.json", r#"{"log_level": "chatty"}"#);
    let missing = dir.path().join("missing.json");

    for path in [zero, level, missing] {
        let err = load_config(Some(&path)).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError, "{}", path.display());
        assert_eq!(err.code_str(), "GRID_CLI_CONFIG_ERROR");
    }
}

// =============================================================================
// Plans
// =============================================================================

#[test]
fn test_explain_plan_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "plan.json", TOP_SCORES_PLAN);
    let plan: ExecutionPlan = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();

    let data = explain_plan(&plan).unwrap();

    assert_eq!(data["shard"], json!([]));
    assert_eq!(data["merge"].as_array().unwrap().len(), 1);
    assert!(data["merge"][0].as_str().unwrap().starts_with("TOPN"));
    assert_eq!(data["intermediate_types"], json!(["string", "long"]));
}

#[test]
fn test_explain_rejects_topn_below_cluster() {
    let plan: ExecutionPlan = serde_json::from_value(json!({
        "input_types": ["long"],
        "shard_projections": [
            {
                "type": "topn",
                "outputs": [{"symbol": "reference", "index": 0, "data_type": "long"}],
                "limit": 1,
                "granularity": "CLUSTER"
            },
            {
                "type": "filter",
                "query": {"symbol": "literal", "value": {"boolean": true}, "data_type": "boolean"},
                "outputs": [{"symbol": "reference", "index": 0, "data_type": "long"}],
                "granularity": "SHARD"
            }
        ]
    }))
    .unwrap();

    let err = explain_plan(&plan).unwrap_err();
    assert_eq!(err.code(), &CliErrorCode::PlanError);
    assert!(err.message().starts_with("shard chain"));
}

// =============================================================================
// Execution
// =============================================================================

#[test]
fn test_execute_with_small_requests() {
    let dir = TempDir::new().unwrap();
    let config_path = write_file(&dir, "engine.json", r#"{"rows_per_request": 1}"#);
    let config = load_config(Some(&config_path)).unwrap();
    let plan: ExecutionPlan = serde_json::from_str(TOP_SCORES_PLAN).unwrap();
    let inputs: Vec<NodeInput> = serde_json::from_value(json!([
        {"shards": [[["ada", 7], ["bo", 3]], [["cy", 9]]]},
        {"shards": [[["di", 8], ["ed", null]]]}
    ]))
    .unwrap();

    let data = execute(config, &plan, inputs).unwrap();

    assert_eq!(data["rows"], json!([["cy", 9], ["di", 8]]));
    assert_eq!(data["metrics"]["rows_received"], 5);
    // One row per request; each node's last request closes its stream
    assert_eq!(data["metrics"]["requests_sent"], 5);
    assert_eq!(data["metrics"]["jobs_completed"], 1);
}

#[test]
fn test_execute_rejects_misshaped_input() {
    let plan: ExecutionPlan = serde_json::from_str(TOP_SCORES_PLAN).unwrap();
    let inputs: Vec<NodeInput> = serde_json::from_value(json!([
        {"shards": [[["ada"]]]}
    ]))
    .unwrap();

    let err = execute(EngineConfig::default(), &plan, inputs).unwrap_err();
    assert_eq!(err.code(), &CliErrorCode::InputError);
    assert!(err.message().contains("node 0"));
}
