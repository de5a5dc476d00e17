use std::path::PathBuf;
use std::sync::Arc;

use action_flow::{ActionRegistry, FailureStrategy, FlowRunner, RunOptions, RunReport, RunStatus};
use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use soulflow_policy_center::{
    ExecutionMode, InMemoryPolicyCenter, PolicyCenter, RuntimeOverrideSpec,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::context::CliContext;
use super::output::emit;
use super::runtime::load_mode_snapshot;
use crate::flow_io::read_flow;
use crate::simulate::{simulated_registry, Dispatch, DispatchRecorder, SimulatedInterpreter};

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Flow file (JSON, or YAML by extension)
    #[arg(value_name = "FLOW")]
    pub flow: PathBuf,

    /// Force the execution mode for this run
    #[arg(long)]
    pub mode: Option<ExecutionMode>,

    /// Print the routing of each step without executing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Keep going after a step fails
    #[arg(long)]
    pub continue_on_error: bool,

    /// Set a variable, NAME=VALUE (VALUE parsed as JSON when possible)
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, Value)>,

    /// Abort the run after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Tab handle passed to every step
    #[arg(long)]
    pub tab_id: Option<i64>,
}

pub fn parse_var(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("variable name missing in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlannedStep {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    executor: action_flow::ExecutorKind,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunOutput {
    report: RunReport,
    dispatches: Vec<Dispatch>,
}

pub async fn cmd_run(args: RunArgs, ctx: &CliContext) -> Result<()> {
    let flow = read_flow(&args.flow).await?;

    let center = InMemoryPolicyCenter::new(load_mode_snapshot(ctx.config())?);
    if let Some(mode) = args.mode {
        center
            .apply_override(RuntimeOverrideSpec {
                path: "mode".to_string(),
                value: Value::String(mode.as_str().to_string()),
                owner: "cli".to_string(),
                reason: "--mode flag".to_string(),
                ttl_seconds: 0,
            })
            .await
            .context("Failed to apply --mode")?;
    }
    let guard = center.guard().await;
    let mode_config = guard.snapshot().config.clone();
    info!(
        mode = %mode_config.mode,
        revision = guard.revision(),
        "execution mode resolved"
    );

    let recorder = Arc::new(DispatchRecorder::default());
    let interpreter = Arc::new(SimulatedInterpreter::new(Arc::clone(&recorder)));
    let registry: Arc<dyn ActionRegistry> = Arc::new(simulated_registry(Arc::clone(&recorder)));
    let runner = FlowRunner::new(&mode_config, interpreter, Some(registry))?;

    if args.dry_run {
        let plan: Vec<PlannedStep> = runner
            .route_plan(&flow)?
            .into_iter()
            .map(|(step, executor)| PlannedStep {
                id: step.id,
                kind: step.kind.to_string(),
                executor,
            })
            .collect();
        if !ctx.output().is_human() {
            return emit(ctx.output(), &plan);
        }
        println!("Dry run of {} in {} mode", flow.id, runner.mode());
        for (index, step) in plan.iter().enumerate() {
            println!("{:>3}. {} [{}] -> {:?}", index + 1, step.id, step.kind, step.executor);
        }
        return Ok(());
    }

    let strategy = if args.continue_on_error {
        FailureStrategy::Continue
    } else {
        ctx.config().failure_strategy
    };
    let cancel = CancellationToken::new();
    let mut options = RunOptions::default()
        .with_strategy(strategy)
        .with_cancel(cancel.clone());
    options.tab_id = args.tab_id;
    if let Some(timeout_ms) = args.timeout_ms.or(ctx.config().run_timeout_ms) {
        options = options.with_timeout(timeout_ms);
    }
    for (name, value) in args.vars {
        options = options.with_variable(name, value);
    }

    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling run");
                cancel.cancel();
            }
        })
    };
    let result = runner.run(&flow, options).await;
    interrupt.abort();
    let report = result?;

    let status = report.status;
    let error = report.error.clone();
    let output = RunOutput {
        report,
        dispatches: recorder.dispatches(),
    };
    if ctx.output().is_human() {
        print_human(&output);
    } else {
        emit(ctx.output(), &output)?;
    }

    match status {
        RunStatus::Succeeded => Ok(()),
        RunStatus::Cancelled => bail!("run cancelled"),
        RunStatus::Failed => Err(anyhow!(error.unwrap_or_else(|| "run failed".to_string()))),
    }
}

fn print_human(output: &RunOutput) {
    let report = &output.report;
    println!(
        "Run {} of {} [{}]: {:?} in {}ms",
        report.run_id, report.flow_id, report.mode, report.status, report.latency_ms
    );
    for step in &report.steps {
        let executor = step
            .executor
            .map(|e| format!("{e:?}").to_lowercase())
            .unwrap_or_else(|| "-".to_string());
        print!(
            "  {} [{}] {:?} via {} ({} attempt(s))",
            step.node_id, step.step_type, step.status, executor, step.attempts
        );
        match &step.error {
            Some(error) => println!(": {error}"),
            None => println!(),
        }
    }
    if !report.variables.is_empty() {
        println!("Variables:");
        let mut names: Vec<_> = report.variables.keys().collect();
        names.sort();
        for name in names {
            println!("  {} = {}", name, report.variables[name]);
        }
    }
}
