use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};
use soulflow_core_types::Flow;
use soulflow_edit_session::EditSession;
use soulflow_flow_graph::{graph_from_flow, steps_for_flow};
use tracing::info;

use super::context::CliContext;
use super::output::OutputFormat;
use crate::flow_io::{read_flow, render_flow, write_flow};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FlowForm {
    /// Nodes and edges
    Graph,
    /// Linear step list
    Steps,
}

#[derive(Args, Clone, Debug)]
pub struct ConvertArgs {
    /// Flow file (JSON, or YAML by extension)
    #[arg(value_name = "FLOW")]
    pub flow: PathBuf,

    /// Target representation
    #[arg(long, value_enum)]
    pub to: FlowForm,

    /// Re-place graph nodes in execution order
    #[arg(long)]
    pub layout: bool,

    /// Write to this file instead of stdout
    #[arg(long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

/// Rebuild `flow` so that only the requested representation is populated.
pub fn convert_flow(flow: &Flow, to: FlowForm) -> Flow {
    let mut converted = flow.clone();
    match to {
        FlowForm::Graph => {
            let (nodes, edges) = graph_from_flow(flow);
            converted.nodes = nodes;
            converted.edges = edges;
            converted.steps.clear();
        }
        FlowForm::Steps => {
            converted.steps = steps_for_flow(flow);
            converted.nodes.clear();
            converted.edges.clear();
        }
    }
    converted
}

pub async fn cmd_convert(args: ConvertArgs, ctx: &CliContext) -> Result<()> {
    let flow = read_flow(&args.flow).await?;
    let mut converted = convert_flow(&flow, args.to);
    if args.layout && args.to == FlowForm::Graph {
        let mut session = EditSession::from_flow(&converted);
        session.auto_layout();
        converted.nodes = session.nodes().to_vec();
    }

    match &args.out {
        Some(path) => {
            write_flow(&converted, path).await?;
            info!("Wrote {:?} form to {}", args.to, path.display());
        }
        None => {
            let yaml = ctx.output() == OutputFormat::Yaml;
            println!("{}", render_flow(&converted, yaml)?.trim_end());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use soulflow_core_types::{NodeType, Step};

    fn linear() -> Flow {
        Flow::new("f1", "linear").with_steps(vec![
            Step::new("s1", NodeType::Navigate).with_field("url", json!("https://a.test")),
            Step::new("s2", NodeType::Click).with_field("selector", json!("#go")),
        ])
    }

    #[test]
    fn steps_to_graph_and_back() {
        let graph = convert_flow(&linear(), FlowForm::Graph);
        assert!(graph.steps.is_empty());
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);

        let steps = convert_flow(&graph, FlowForm::Steps);
        assert!(steps.nodes.is_empty());
        let ids: Vec<_> = steps.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert_eq!(steps.steps[0].field("url"), Some(&json!("https://a.test")));
    }
}
