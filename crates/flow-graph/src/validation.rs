//! Structural validation. Problems are returned as data, never raised.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::Serialize;
use soulflow_core_types::{Edge, EdgeId, Node, NodeId};

use crate::catalog::spec_for;
use crate::scheduler::schedule;

/// Problems with a single node's configuration. Disabled nodes are never
/// checked.
pub fn validate_node(node: &Node) -> Vec<String> {
    if node.disabled {
        return Vec::new();
    }
    spec_for(&node.kind).validate(&node.config)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowValidation {
    pub total_errors: usize,
    /// Only nodes with at least one error appear here.
    pub node_errors: BTreeMap<NodeId, Vec<String>>,
}

impl FlowValidation {
    pub fn is_valid(&self) -> bool {
        self.total_errors == 0
    }
}

pub fn validate_flow(nodes: &[Node]) -> FlowValidation {
    let mut report = FlowValidation::default();
    for node in nodes {
        let errors = validate_node(node);
        if errors.is_empty() {
            continue;
        }
        report.total_errors += errors.len();
        report
            .node_errors
            .entry(node.id.clone())
            .or_default()
            .extend(errors);
    }
    report
}

/// Graph-level consistency problems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GraphIssue {
    DuplicateNodeId { node_id: NodeId },
    DuplicateEdgeId { edge_id: EdgeId },
    DanglingEdge { edge_id: EdgeId, missing: NodeId },
    MultipleDefaultOutEdges { node_id: NodeId, count: usize },
    DefaultCycle { nodes: Vec<NodeId> },
}

impl fmt::Display for GraphIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphIssue::DuplicateNodeId { node_id } => write!(f, "duplicate node id {node_id}"),
            GraphIssue::DuplicateEdgeId { edge_id } => write!(f, "duplicate edge id {edge_id}"),
            GraphIssue::DanglingEdge { edge_id, missing } => {
                write!(f, "edge {edge_id} references unknown node {missing}")
            }
            GraphIssue::MultipleDefaultOutEdges { node_id, count } => {
                write!(f, "node {node_id} has {count} default out-edges")
            }
            GraphIssue::DefaultCycle { nodes } => {
                write!(f, "default edges form a cycle through {}", nodes.join(", "))
            }
        }
    }
}

/// Check id uniqueness, edge endpoints, the single-default-successor rule and
/// acyclicity of default edges.
pub fn validate_graph(nodes: &[Node], edges: &[Edge]) -> Vec<GraphIssue> {
    let mut issues = Vec::new();

    let mut seen_nodes = HashSet::new();
    for node in nodes {
        if !seen_nodes.insert(node.id.as_str()) {
            issues.push(GraphIssue::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }
    }

    let mut seen_edges = HashSet::new();
    let mut default_out: BTreeMap<&str, usize> = BTreeMap::new();
    for edge in edges {
        if !seen_edges.insert(edge.id.as_str()) {
            issues.push(GraphIssue::DuplicateEdgeId {
                edge_id: edge.id.clone(),
            });
        }
        for endpoint in [&edge.from, &edge.to] {
            if !seen_nodes.contains(endpoint.as_str()) {
                issues.push(GraphIssue::DanglingEdge {
                    edge_id: edge.id.clone(),
                    missing: endpoint.clone(),
                });
            }
        }
        if edge.is_default() {
            *default_out.entry(edge.from.as_str()).or_default() += 1;
        }
    }

    // One issue per source id, even when the id itself is duplicated.
    for (&node_id, &count) in &default_out {
        if count > 1 && seen_nodes.contains(node_id) {
            issues.push(GraphIssue::MultipleDefaultOutEdges {
                node_id: node_id.to_string(),
                count,
            });
        }
    }

    if let Some(cycle) = schedule(nodes, edges).fallback {
        issues.push(GraphIssue::DefaultCycle {
            nodes: cycle.unscheduled,
        });
    }

    issues
}
