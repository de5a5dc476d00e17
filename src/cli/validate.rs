use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;
use soulflow_flow_graph::{graph_from_flow, validate_flow, validate_graph, FlowValidation, GraphIssue};

use super::context::CliContext;
use super::output::emit;
use crate::flow_io::read_flow;

#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Flow file (JSON, or YAML by extension)
    #[arg(value_name = "FLOW")]
    pub flow: PathBuf,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationReport {
    flow_id: String,
    valid: bool,
    nodes: FlowValidation,
    graph: Vec<GraphIssue>,
}

pub async fn cmd_validate(args: ValidateArgs, ctx: &CliContext) -> Result<()> {
    let flow = read_flow(&args.flow).await?;
    let (nodes, edges) = graph_from_flow(&flow);

    let node_report = validate_flow(&nodes);
    let graph = validate_graph(&nodes, &edges);
    let report = ValidationReport {
        flow_id: flow.id.clone(),
        valid: node_report.is_valid() && graph.is_empty(),
        nodes: node_report,
        graph,
    };

    if ctx.output().is_human() {
        print_human(&report);
    } else {
        emit(ctx.output(), &report)?;
    }

    if !report.valid {
        bail!(
            "flow {} is invalid: {} node error(s), {} graph issue(s)",
            report.flow_id,
            report.nodes.total_errors,
            report.graph.len()
        );
    }
    Ok(())
}

fn print_human(report: &ValidationReport) {
    if report.valid {
        println!("✓ {} is valid", report.flow_id);
        return;
    }
    println!("✗ {} has problems", report.flow_id);
    for (node_id, errors) in &report.nodes.node_errors {
        for error in errors {
            println!("  {node_id}: {error}");
        }
    }
    for issue in &report.graph {
        println!("  graph: {issue}");
    }
}
