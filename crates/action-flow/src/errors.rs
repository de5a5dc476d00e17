//! Flow execution error types

use soulflow_core_types::SoulError;
use soulflow_flow_graph::FlowValidation;
use thiserror::Error;

/// Flow execution errors
#[derive(Debug, Error)]
pub enum FlowError {
    /// Illegal executor setup, raised when the executor is built
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The flow did not pass validation before the first step
    #[error("Pre-flight validation failed with {} error(s)", .0.total_errors)]
    PreflightFailed(FlowValidation),

    /// Step execution failed
    #[error("Step {step_id} failed: {reason}")]
    StepFailed { step_id: String, reason: String },

    /// No registry handler for the step type
    #[error("No action handler registered for type '{0}'")]
    UnsupportedAction(String),

    /// Whole-run deadline exceeded
    #[error("Flow timed out after {0}ms")]
    Timeout(u64),
}

impl From<FlowError> for SoulError {
    fn from(err: FlowError) -> Self {
        SoulError::new(err.to_string())
    }
}
