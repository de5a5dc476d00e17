//! Arena view over a flow graph.
//!
//! Nodes are addressed by their position in the original slice; edges become
//! adjacency lists of indices. Only `default` edges are indexed since they are
//! the only ones that order execution.

use std::collections::HashMap;

use crate::model::{Edge, Node};

pub struct FlowGraph<'a> {
    nodes: &'a [Node],
    index: HashMap<&'a str, usize>,
    successors: Vec<Vec<usize>>,
    in_degree: Vec<usize>,
}

impl<'a> FlowGraph<'a> {
    /// Build the arena. Duplicate node ids resolve to their first occurrence;
    /// edges naming unknown nodes or with a non-default label are skipped.
    pub fn new(nodes: &'a [Node], edges: &'a [Edge]) -> Self {
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            index.entry(node.id.as_str()).or_insert(i);
        }

        let mut successors = vec![Vec::new(); nodes.len()];
        let mut in_degree = vec![0usize; nodes.len()];
        for edge in edges.iter().filter(|edge| edge.is_default()) {
            let (Some(&from), Some(&to)) =
                (index.get(edge.from.as_str()), index.get(edge.to.as_str()))
            else {
                continue;
            };
            successors[from].push(to);
            in_degree[to] += 1;
        }

        Self {
            nodes,
            index,
            successors,
            in_degree,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: usize) -> &'a Node {
        &self.nodes[idx]
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn successors(&self, idx: usize) -> &[usize] {
        &self.successors[idx]
    }

    /// Default-edge in-degree of every node, indexed like the node slice.
    pub fn in_degrees(&self) -> Vec<usize> {
        self.in_degree.clone()
    }
}
