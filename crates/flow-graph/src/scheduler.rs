//! Execution ordering for graph flows.
//!
//! Kahn's algorithm over `default` edges only. When a cycle keeps some nodes
//! from ever reaching in-degree zero the original declaration order is
//! returned instead of an error, so the editor is never blocked.

use std::collections::VecDeque;

use serde::Serialize;
use soulflow_core_types::{Edge, Flow, FlowGraph, Node, NodeId, Step};
use tracing::{debug, warn};

use crate::transform::{map_config_to_step, steps_to_nodes};

/// Nodes left unordered because they sit on (or behind) a default-edge cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleDiagnostic {
    pub unscheduled: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Schedule {
    pub order: Vec<Node>,
    /// Set when ordering fell back to declaration order.
    pub fallback: Option<CycleDiagnostic>,
}

/// Order nodes and report whether the cycle fallback kicked in.
pub fn schedule(nodes: &[Node], edges: &[Edge]) -> Schedule {
    let graph = FlowGraph::new(nodes, edges);
    let mut in_degree = graph.in_degrees();
    let mut queue: VecDeque<usize> = (0..graph.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut visited = vec![false; graph.len()];
    let mut order = Vec::with_capacity(graph.len());

    while let Some(idx) = queue.pop_front() {
        visited[idx] = true;
        order.push(idx);
        for &next in graph.successors(idx) {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() == graph.len() {
        debug!(nodes = order.len(), "topological order resolved");
        return Schedule {
            order: order.into_iter().map(|i| graph.node(i).clone()).collect(),
            fallback: None,
        };
    }

    let unscheduled: Vec<NodeId> = (0..graph.len())
        .filter(|&i| !visited[i])
        .map(|i| graph.node(i).id.clone())
        .collect();
    warn!(
        unscheduled = unscheduled.len(),
        "default edges form a cycle, falling back to declaration order"
    );
    Schedule {
        order: nodes.to_vec(),
        fallback: Some(CycleDiagnostic { unscheduled }),
    }
}

/// Topological order over default edges, or `nodes` unchanged on a cycle.
pub fn topo_order(nodes: &[Node], edges: &[Edge]) -> Vec<Node> {
    schedule(nodes, edges).order
}

/// Execution-ordered steps for a graph. Without edges the node array order
/// is kept as-is.
pub fn nodes_to_steps(nodes: &[Node], edges: &[Edge]) -> Vec<Step> {
    if edges.is_empty() {
        return nodes.iter().map(map_config_to_step).collect();
    }
    topo_order(nodes, edges)
        .iter()
        .map(map_config_to_step)
        .collect()
}

/// Steps to execute for `flow`, honoring whichever representation is
/// authoritative. Linear steps without ids get one assigned.
pub fn steps_for_flow(flow: &Flow) -> Vec<Step> {
    if flow.is_graph_authoritative() {
        nodes_to_steps(&flow.nodes, &flow.edges)
    } else {
        nodes_to_steps(&steps_to_nodes(&flow.steps), &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soulflow_core_types::{EdgeLabel, NodeType};

    fn nodes(ids: &[&str]) -> Vec<Node> {
        ids.iter().map(|id| Node::new(*id, NodeType::Click)).collect()
    }

    fn ids(nodes: &[Node]) -> Vec<&str> {
        nodes.iter().map(|node| node.id.as_str()).collect()
    }

    fn edge(id: &str, from: &str, to: &str) -> Edge {
        Edge::new(id, from, to, Some(EdgeLabel::Default))
    }

    #[test]
    fn linear_chain_keeps_array_order() {
        let list = nodes(&["a", "b", "c", "d"]);
        let edges = vec![edge("1", "a", "b"), edge("2", "b", "c"), edge("3", "c", "d")];
        assert_eq!(ids(&topo_order(&list, &edges)), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn edges_reorder_declared_nodes() {
        let list = nodes(&["c", "a", "b"]);
        let edges = vec![edge("1", "a", "b"), edge("2", "b", "c")];
        assert_eq!(ids(&topo_order(&list, &edges)), vec!["a", "b", "c"]);
    }

    #[test]
    fn ties_break_by_declaration_order() {
        let list = nodes(&["x", "y", "z"]);
        let edges = vec![edge("1", "y", "z")];
        assert_eq!(ids(&topo_order(&list, &edges)), vec!["x", "y", "z"]);
    }

    #[test]
    fn cycle_falls_back_to_original_order() {
        let list = nodes(&["b", "a", "c"]);
        let edges = vec![edge("1", "a", "b"), edge("2", "b", "a"), edge("3", "c", "a")];
        let result = schedule(&list, &edges);
        assert_eq!(ids(&result.order), vec!["b", "a", "c"]);
        let diagnostic = result.fallback.expect("cycle should be reported");
        assert_eq!(diagnostic.unscheduled, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(ids(&topo_order(&list, &edges)), vec!["b", "a", "c"]);
    }

    #[test]
    fn non_default_edges_do_not_order() {
        let list = nodes(&["b", "a"]);
        let edges = vec![
            Edge::new("1", "a", "b", Some(EdgeLabel::True)),
            Edge::new("2", "b", "a", Some(EdgeLabel::OnError)),
        ];
        let result = schedule(&list, &edges);
        assert!(result.fallback.is_none());
        assert_eq!(ids(&result.order), vec!["b", "a"]);
    }

    #[test]
    fn nodes_to_steps_without_edges_keeps_raw_order() {
        let list = nodes(&["z", "y"]);
        let steps = nodes_to_steps(&list, &[]);
        assert_eq!(steps[0].id, "z");
        assert_eq!(steps[1].id, "y");
    }

    #[test]
    fn linear_flow_steps_get_ids() {
        let flow = Flow::new("f", "demo").with_steps(vec![Step::new("", NodeType::Navigate)]);
        let steps = steps_for_flow(&flow);
        assert_eq!(steps.len(), 1);
        assert!(!steps[0].id.is_empty());
    }
}
