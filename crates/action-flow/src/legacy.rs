//! Legacy interpreter contract.

use async_trait::async_trait;
use serde_json::Value;
use soulflow_core_types::Step;

use crate::errors::FlowError;
use crate::types::ExecCtx;

/// The pre-existing step interpreter. Handles every step type and applies
/// no policy flags. An `Err` marks the step as failed.
#[async_trait]
pub trait LegacyInterpreter: Send + Sync {
    async fn execute_step(&self, ctx: &mut ExecCtx, step: &Step) -> Result<Option<Value>, FlowError>;
}
