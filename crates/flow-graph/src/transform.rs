//! Step <-> node conversion, default configs, chaining and summaries.

use serde_json::Value;
use soulflow_core_types::{
    new_node_id, Edge, Flow, Node, NodeConfig, NodeType, Position, Step,
};

use crate::catalog::spec_for;

const LAYOUT_X: f64 = 200.0;
const LAYOUT_TOP: f64 = 120.0;
const LAYOUT_GAP: f64 = 120.0;

/// Default vertical position of the `index`-th node.
pub fn layout_position(index: usize) -> Position {
    Position::new(LAYOUT_X, LAYOUT_TOP + index as f64 * LAYOUT_GAP)
}

/// Convert linear steps into graph nodes, one node per step, in order.
pub fn steps_to_nodes(steps: &[Step]) -> Vec<Node> {
    steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let id = if step.id.trim().is_empty() {
                new_node_id()
            } else {
                step.id.clone()
            };
            Node {
                id,
                kind: step.kind.clone(),
                name: step
                    .field("name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                disabled: step.is_disabled(),
                config: map_step_to_config(step),
                ui_position: layout_position(index),
            }
        })
        .collect()
}

/// Pull the type-specific fields of `step` into a node config.
///
/// Known types copy their declared fields first and then carry any other
/// field through untouched; unknown types are a plain shallow copy.
pub fn map_step_to_config(step: &Step) -> NodeConfig {
    let spec = spec_for(&step.kind);
    let mut config = NodeConfig::new();
    for key in spec.significant_fields() {
        if let Some(value) = step.fields.get(*key) {
            config.insert((*key).to_string(), value.clone());
        }
    }
    for (key, value) in &step.fields {
        if is_node_level(key, value) || config.contains_key(key) {
            continue;
        }
        config.insert(key.clone(), value.clone());
    }
    config
}

/// Flatten a node back into its step form.
pub fn map_config_to_step(node: &Node) -> Step {
    let mut step = Step::new(node.id.clone(), node.kind.clone());
    for (key, value) in &node.config {
        step.fields.insert(key.clone(), value.clone());
    }
    if let Some(name) = &node.name {
        step.fields
            .insert("name".to_string(), Value::String(name.clone()));
    }
    if node.disabled {
        step.fields.insert("disabled".to_string(), Value::Bool(true));
    }
    step
}

/// Step fields that live on the node itself rather than in `config`. An
/// explicit `disabled: false` stays in `config` so it survives the round trip.
fn is_node_level(key: &str, value: &Value) -> bool {
    match key {
        "name" => value.is_string(),
        "disabled" => value.as_bool() == Some(true),
        _ => false,
    }
}

/// Linear chain `nodes[i] -> nodes[i + 1]` with `default` labels.
pub fn auto_chain_edges(nodes: &[Node]) -> Vec<Edge> {
    nodes
        .windows(2)
        .map(|pair| Edge::default_between(pair[0].id.clone(), pair[1].id.clone()))
        .collect()
}

/// Canonical empty configuration for a new node of `kind`.
pub fn default_config_for(kind: &NodeType) -> NodeConfig {
    spec_for(kind).default_config()
}

pub fn summarize_node(node: &Node) -> String {
    spec_for(&node.kind).summarize(&node.config)
}

/// Graph form of a flow: its own nodes when present, otherwise nodes derived
/// from the steps. Edges are synthesized as a linear chain when missing.
pub fn graph_from_flow(flow: &Flow) -> (Vec<Node>, Vec<Edge>) {
    let nodes = if flow.is_graph_authoritative() {
        flow.nodes.clone()
    } else {
        steps_to_nodes(&flow.steps)
    };
    let edges = if flow.edges.is_empty() {
        auto_chain_edges(&nodes)
    } else {
        flow.edges.clone()
    };
    (nodes, edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample_step(kind: NodeType) -> Step {
        let step = Step::new(format!("s_{kind}"), kind.clone());
        let step = match kind {
            NodeType::Click | NodeType::Dblclick => step
                .with_field("target", json!({ "candidates": [{ "type": "css", "value": "#go" }] }))
                .with_field("after", json!({ "waitForNavigation": true })),
            NodeType::Fill => step
                .with_field("target", json!({ "candidates": [{ "type": "css", "value": "#q" }] }))
                .with_field("value", json!("rust")),
            NodeType::Key => step.with_field("keys", json!("Enter")),
            NodeType::Scroll => step.with_field("mode", json!("element")),
            NodeType::Drag => step
                .with_field("start", json!({ "candidates": [] }))
                .with_field("end", json!({ "candidates": [] })),
            NodeType::Wait => step.with_field("condition", json!({ "selector": "#done" })),
            NodeType::Delay => step.with_field("ms", json!(250)),
            NodeType::Assert => step.with_field("assert", json!({ "textPresent": "ok" })),
            NodeType::Navigate | NodeType::OpenTab => {
                step.with_field("url", json!("https://example.com"))
            }
            NodeType::Http => step
                .with_field("method", json!("POST"))
                .with_field("url", json!("https://api.test"))
                .with_field("assign", json!({ "id": "data.id" })),
            NodeType::Extract => step
                .with_field("selector", json!("h1"))
                .with_field("saveAs", json!("title")),
            NodeType::Script => step.with_field("code", json!("return 1")),
            NodeType::Screenshot => step.with_field("fullPage", json!(true)),
            NodeType::SwitchTab => step.with_field("urlContains", json!("inbox")),
            NodeType::CloseTab => step,
            NodeType::Unknown(_) => step.with_field("anything", json!([1, 2])),
        };
        step.with_field("retry", json!({ "count": 2, "interval": 100 }))
            .with_field("name", json!("labelled"))
            .with_field("disabled", json!(false))
    }

    #[test]
    fn every_type_round_trips_through_a_node() {
        let mut kinds = NodeType::KNOWN.to_vec();
        kinds.push(NodeType::from("hover"));
        for kind in kinds {
            let step = sample_step(kind.clone());
            let nodes = steps_to_nodes(std::slice::from_ref(&step));
            let back = map_config_to_step(&nodes[0]);
            assert_eq!(back, step, "round trip for {kind}");
        }
    }

    #[test]
    fn node_level_fields_leave_config() {
        let step = Step::new("s1", NodeType::Navigate)
            .with_field("url", json!("https://a.test"))
            .with_field("name", json!("Open"))
            .with_field("disabled", json!(true));
        let node = &steps_to_nodes(&[step])[0];
        assert_eq!(node.name.as_deref(), Some("Open"));
        assert!(node.disabled);
        assert!(!node.config.contains_key("name"));
        assert!(!node.config.contains_key("disabled"));
    }

    #[test]
    fn explicit_enabled_flag_survives_round_trip() {
        let step = Step::new("s1", NodeType::Navigate)
            .with_field("url", json!("https://a.test"))
            .with_field("disabled", json!(false));
        let node = &steps_to_nodes(std::slice::from_ref(&step))[0];
        assert!(!node.disabled);
        assert_eq!(node.config.get("disabled"), Some(&json!(false)));
        assert_eq!(map_config_to_step(node), step);
    }

    #[test]
    fn missing_ids_are_generated_and_layout_is_vertical() {
        let steps = vec![
            Step::new("", NodeType::Click),
            Step::new("keep", NodeType::Fill),
            Step::new("  ", NodeType::Key),
        ];
        let nodes = steps_to_nodes(&steps);
        assert!(nodes[0].id.starts_with("n_"));
        assert_eq!(nodes[1].id, "keep");
        assert!(nodes[2].id.starts_with("n_"));
        assert_eq!(nodes[0].ui_position, Position::new(200.0, 120.0));
        assert_eq!(nodes[2].ui_position, Position::new(200.0, 360.0));
    }

    #[test]
    fn auto_chain_builds_a_single_path() {
        assert!(auto_chain_edges(&[]).is_empty());
        assert!(auto_chain_edges(&[Node::new("a", NodeType::Click)]).is_empty());

        let nodes: Vec<Node> = ["a", "b", "c", "d"]
            .iter()
            .map(|id| Node::new(*id, NodeType::Click))
            .collect();
        let edges = auto_chain_edges(&nodes);
        assert_eq!(edges.len(), 3);
        for (edge, pair) in edges.iter().zip(nodes.windows(2)) {
            assert_eq!(edge.from, pair[0].id);
            assert_eq!(edge.to, pair[1].id);
            assert!(edge.is_default());
        }
    }

    #[test]
    fn graph_from_linear_flow_chains_steps() {
        let flow = Flow::new("f", "demo").with_steps(vec![
            Step::new("s1", NodeType::Navigate),
            Step::new("s2", NodeType::Click),
        ]);
        let (nodes, edges) = graph_from_flow(&flow);
        assert_eq!(nodes.len(), 2);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].from, "s1");
    }

    #[test]
    fn default_configs_seed_targets() {
        let click = default_config_for(&NodeType::Click);
        assert_eq!(click["target"], json!({ "candidates": [] }));
        let fill = default_config_for(&NodeType::Fill);
        assert_eq!(fill["target"], json!({ "candidates": [] }));
        assert!(default_config_for(&NodeType::CloseTab).is_empty());
    }
}
