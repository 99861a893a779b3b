//! CLI command implementations
//!
//! Both commands read a JSON [`ExecutionPlan`]. `run` executes it over an
//! in-process cluster and prints the merged rows; `explain` validates every
//! chain and prints them.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value as Json};

use crate::config::EngineConfig;
use crate::distributed::{ExecutionPlan, LocalCluster};
use crate::executor::{MemorySink, ProjectorChain, ProjectorFactory};
use crate::functions::FunctionRegistry;
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::projection::Projection;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{buckets_from_inputs, read_json_file, rows_to_json, write_response, NodeInput};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Run {
            config,
            plan,
            input,
        } => run_plan(config.as_deref(), &plan, &input),
        Command::Explain { plan } => explain(&plan),
    }
}

/// Loads the engine config, or the defaults without a path, and applies its log level
pub fn load_config(path: Option<&Path>) -> CliResult<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    Logger::set_min_severity(config.severity()?);
    let source = path.map_or_else(|| "defaults".to_string(), |p| p.display().to_string());
    log_event_with_fields(Event::ConfigLoaded, &[("source", source.as_str())]);
    Ok(config)
}

fn load_plan(path: &Path) -> CliResult<ExecutionPlan> {
    read_json_file(path).map_err(|e| CliError::plan_error(e.message()))
}

/// Execute a plan file over the node inputs
pub fn run_plan(config_path: Option<&Path>, plan_path: &Path, input_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let plan = load_plan(plan_path)?;
    let inputs: Vec<NodeInput> =
        read_json_file(input_path).map_err(|e| CliError::input_error(e.message()))?;
    let data = execute(config, &plan, inputs)?;
    write_response(data)
}

/// Runs `plan` and returns the response payload: merged rows, rows written
/// by WRITE projections, and transport metrics
pub fn execute(config: EngineConfig, plan: &ExecutionPlan, inputs: Vec<NodeInput>) -> CliResult<Json> {
    let nodes = buckets_from_inputs(inputs, &plan.input_types)?;
    let sink = Arc::new(MemorySink::new());
    let factory = Arc::new(
        ProjectorFactory::new(Arc::new(FunctionRegistry::new())).with_sink(sink.clone()),
    );

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::execution_failed(format!("Failed to create tokio runtime: {}", e)))?;
    let (rows, metrics) = runtime.block_on(async {
        let cluster = LocalCluster::new(config, factory)?;
        let rows = cluster.run(plan, nodes).await?;
        Ok::<_, CliError>((rows, cluster.metrics().snapshot()))
    })?;

    Ok(json!({
        "rows": rows_to_json(&rows),
        "written": rows_to_json(&sink.rows()?),
        "metrics": {
            "requests_sent": metrics.requests_sent,
            "requests_received": metrics.requests_received,
            "rows_received": metrics.rows_received,
            "results_deferred": metrics.results_deferred,
            "jobs_completed": metrics.jobs_completed,
            "jobs_failed": metrics.jobs_failed,
        },
    }))
}

/// Validate a plan file and print its chains
pub fn explain(plan_path: &Path) -> CliResult<()> {
    let plan = load_plan(plan_path)?;
    let data = explain_plan(&plan)?;
    log_event_with_fields(Event::ExplainComplete, &[("plan", plan_path.display().to_string().as_str())]);
    write_response(data)
}

/// Builds every chain of `plan` (resolving functions and checking
/// granularity order) and renders the projections
pub fn explain_plan(plan: &ExecutionPlan) -> CliResult<Json> {
    let factory = ProjectorFactory::new(Arc::new(FunctionRegistry::new()))
        .with_sink(Arc::new(MemorySink::new()));
    let phases = [
        ("shard", &plan.shard_projections),
        ("node", &plan.node_projections),
        ("merge", &plan.merge_projections),
    ];
    let mut chains = serde_json::Map::new();
    for (name, projections) in phases {
        ProjectorChain::build(projections, &factory).map_err(|e| {
            CliError::plan_error(format!("{} chain: {}: {}", name, e.code(), e))
        })?;
        chains.insert(name.to_string(), describe(projections));
    }
    let intermediate: Vec<&str> = plan.intermediate_types().iter().map(|t| t.name()).collect();
    chains.insert("intermediate_types".to_string(), json!(intermediate));
    Ok(Json::Object(chains))
}

fn describe(projections: &[Projection]) -> Json {
    Json::Array(
        projections
            .iter()
            .map(|p| Json::String(p.to_string()))
            .collect(),
    )
}
