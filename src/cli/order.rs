use std::path::PathBuf;

use action_flow::FlowRunner;
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use soulflow_core_types::NodeType;
use soulflow_flow_graph::{steps_to_nodes, summarize_node, CycleDiagnostic};
use tracing::warn;

use super::context::CliContext;
use super::output::emit;
use crate::flow_io::read_flow;

#[derive(Args, Clone, Debug)]
pub struct OrderArgs {
    /// Flow file (JSON, or YAML by extension)
    #[arg(value_name = "FLOW")]
    pub flow: PathBuf,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderedStep {
    id: String,
    #[serde(rename = "type")]
    kind: NodeType,
    disabled: bool,
    summary: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderReport {
    flow_id: String,
    steps: Vec<OrderedStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cycle: Option<CycleDiagnostic>,
}

pub async fn cmd_order(args: OrderArgs, ctx: &CliContext) -> Result<()> {
    let flow = read_flow(&args.flow).await?;
    let (steps, cycle) = FlowRunner::plan(&flow);

    if let Some(cycle) = &cycle {
        warn!(
            unscheduled = ?cycle.unscheduled,
            "default edges contain a cycle, using declaration order"
        );
    }

    let steps = steps_to_nodes(&steps)
        .into_iter()
        .map(|node| OrderedStep {
            summary: summarize_node(&node),
            id: node.id,
            kind: node.kind,
            disabled: node.disabled,
        })
        .collect();
    let report = OrderReport {
        flow_id: flow.id,
        steps,
        cycle,
    };

    if !ctx.output().is_human() {
        return emit(ctx.output(), &report);
    }

    for (index, step) in report.steps.iter().enumerate() {
        let marker = if step.disabled { " (disabled)" } else { "" };
        println!(
            "{:>3}. {} [{}] {}{}",
            index + 1,
            step.id,
            step.kind,
            step.summary,
            marker
        );
    }
    if let Some(cycle) = &report.cycle {
        println!("⚠ cycle fallback: {}", cycle.unscheduled.join(", "));
    }
    Ok(())
}
