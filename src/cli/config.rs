use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use soulflow_policy_center::{ExecutionModeConfig, PolicyProvenance};

use super::context::CliContext;
use super::output::emit;
use super::runtime::load_mode_snapshot;
use crate::config::Config;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Show the application settings and the effective execution mode
    Show,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigView<'a> {
    config_path: String,
    settings: &'a Config,
    revision: u64,
    execution: ExecutionModeConfig,
    provenance: Vec<PolicyProvenance>,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    match args.action {
        ConfigAction::Show => show(ctx),
    }
}

fn show(ctx: &CliContext) -> Result<()> {
    let snapshot = load_mode_snapshot(ctx.config())?;
    let mut provenance: Vec<_> = snapshot.provenance.values().cloned().collect();
    provenance.sort_by(|a, b| a.path.cmp(&b.path));

    let view = ConfigView {
        config_path: ctx.config_path().display().to_string(),
        settings: ctx.config(),
        revision: snapshot.rev,
        execution: snapshot.config,
        provenance,
    };

    if !ctx.output().is_human() {
        return emit(ctx.output(), &view);
    }

    println!("Config file: {}", view.config_path);
    println!("Failure strategy: {:?}", view.settings.failure_strategy);
    if let Some(timeout) = view.settings.run_timeout_ms {
        println!("Run timeout: {timeout}ms");
    }
    println!("Execution mode: {}", view.execution.mode);
    let allowlist: Vec<String> = view
        .execution
        .effective_allowlist()
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("Hybrid allowlist: {}", allowlist.join(", "));
    println!("Skip actions retry: {}", view.execution.skip_actions_retry);
    println!("Skip actions nav wait: {}", view.execution.skip_actions_nav_wait);
    for entry in &view.provenance {
        println!("  {} <- {:?}", entry.path, entry.source);
    }
    Ok(())
}
