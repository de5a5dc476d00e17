use soulflow_core_types::{EdgeId, NodeId, SoulError};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),
    #[error("edge not found: {0}")]
    EdgeNotFound(EdgeId),
    #[error("cannot connect node {0} to itself")]
    SelfLoop(NodeId),
}

impl From<SessionError> for SoulError {
    fn from(err: SessionError) -> Self {
        SoulError::new(err.to_string())
    }
}
