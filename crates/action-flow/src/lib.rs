//! Flow execution layer
//!
//! Runs a flow's scheduled steps one at a time through a pluggable step
//! executor. The executor is picked once per run from the execution mode
//! policy: the legacy interpreter, the action registry, or a hybrid that
//! routes allowlisted types to the registry.

pub mod adapter;
pub mod errors;
pub mod executors;
pub mod legacy;
pub mod log;
pub mod registry;
pub mod runner;
pub mod strategies;
pub mod types;

pub use adapter::{execute_via_registry, prepare_dispatch, ExecutionOverrides};
pub use errors::FlowError;
pub use executors::{
    create_step_executor, ActionsStepExecutor, ExecutionStrategy, HybridStepExecutor,
    LegacyStepExecutor, StepExecutor,
};
pub use legacy::LegacyInterpreter;
pub use log::{LogEntry, LogLevel, RunLog};
pub use registry::{
    Action, ActionExecutionContext, ActionHandler, ActionPolicy, ActionRegistry, ActionResult,
    ActionStatus, ExecutionFlags, InMemoryActionRegistry,
};
pub use runner::{FlowRunner, RunOptions};
pub use strategies::{DefaultFailureHandler, FailureDecision, FailureHandler};
pub use types::{
    ExecCtx, ExecutorKind, FailureStrategy, RunReport, RunStatus, StepOutcome, StepResult,
    StepRunStatus, StepStatus,
};
