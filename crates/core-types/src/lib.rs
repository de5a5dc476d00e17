//! Shared primitives for the SoulFlow engine.
//!
//! Everything in here is plain data: nodes, edges, flows, the legacy step form
//! and the history snapshot. Behavior lives in the crates that consume them.

mod graph;
mod ids;
mod model;
mod retry;

use thiserror::Error;

pub use graph::FlowGraph;
pub use ids::{new_edge_id, new_flow_id, new_node_id, EdgeId, FlowId, NodeId};
pub use model::{
    Edge, EdgeLabel, Flow, FlowMeta, Node, NodeConfig, NodeType, Position, Snapshot, Step,
    VariableDecl,
};
pub use retry::{Backoff, RetryPolicy};

/// Shared error type for the SoulFlow crates.
#[derive(Debug, Error, Clone)]
pub enum SoulError {
    #[error("{message}")]
    Message { message: String },
}

impl SoulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}
