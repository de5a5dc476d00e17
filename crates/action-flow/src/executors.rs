//! Step executors
//!
//! One executor is built per run from the execution mode policy. Every
//! executor returns the same [`StepOutcome`] envelope so the runner does not
//! care which path handled a step.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use soulflow_core_types::{NodeType, Step};
use soulflow_policy_center::{ExecutionMode, ExecutionModeConfig};
use tracing::{debug, info};

use crate::adapter::{execute_via_registry, ExecutionOverrides};
use crate::errors::FlowError;
use crate::legacy::LegacyInterpreter;
use crate::registry::ActionRegistry;
use crate::types::{ExecCtx, ExecutorKind, StepOutcome};

/// Step executor trait
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Mode this executor implements
    fn mode(&self) -> ExecutionMode;

    /// Whether the executor can take this step type
    fn supports(&self, kind: &NodeType) -> bool;

    /// Which path a step of this type takes
    fn route(&self, kind: &NodeType) -> ExecutorKind;

    /// Executes one step. Handler failures come back as a failed outcome;
    /// `Err` is reserved for steps the executor cannot run at all.
    async fn execute(
        &self,
        ctx: &mut ExecCtx,
        step: &Step,
        overrides: ExecutionOverrides,
    ) -> Result<StepOutcome, FlowError>;
}

/// Runs every step through the legacy interpreter
pub struct LegacyStepExecutor {
    interpreter: Arc<dyn LegacyInterpreter>,
}

impl LegacyStepExecutor {
    pub fn new(interpreter: Arc<dyn LegacyInterpreter>) -> Self {
        Self { interpreter }
    }
}

#[async_trait]
impl StepExecutor for LegacyStepExecutor {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Legacy
    }

    fn supports(&self, _kind: &NodeType) -> bool {
        true
    }

    fn route(&self, _kind: &NodeType) -> ExecutorKind {
        ExecutorKind::Legacy
    }

    async fn execute(
        &self,
        ctx: &mut ExecCtx,
        step: &Step,
        _overrides: ExecutionOverrides,
    ) -> Result<StepOutcome, FlowError> {
        let outcome = match self.interpreter.execute_step(ctx, step).await {
            Ok(output) => StepOutcome::success(&step.id, ExecutorKind::Legacy, output),
            Err(err) => StepOutcome::failed(&step.id, ExecutorKind::Legacy, err.to_string()),
        };
        Ok(outcome)
    }
}

/// Runs every step through the action registry
pub struct ActionsStepExecutor {
    registry: Arc<dyn ActionRegistry>,
}

impl ActionsStepExecutor {
    pub fn new(registry: Arc<dyn ActionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl StepExecutor for ActionsStepExecutor {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Actions
    }

    fn supports(&self, kind: &NodeType) -> bool {
        self.registry.get(kind).is_some()
    }

    fn route(&self, _kind: &NodeType) -> ExecutorKind {
        ExecutorKind::Actions
    }

    async fn execute(
        &self,
        ctx: &mut ExecCtx,
        step: &Step,
        overrides: ExecutionOverrides,
    ) -> Result<StepOutcome, FlowError> {
        if !self.supports(&step.kind) {
            return Err(FlowError::UnsupportedAction(step.kind.to_string()));
        }
        let result = execute_via_registry(self.registry.as_ref(), ctx, step, overrides).await;
        let outcome = if result.is_success() {
            StepOutcome::success(&step.id, ExecutorKind::Actions, result.output)
        } else {
            StepOutcome::failed(
                &step.id,
                ExecutorKind::Actions,
                result
                    .error
                    .unwrap_or_else(|| "action failed".to_string()),
            )
        };
        Ok(outcome)
    }
}

/// Routes allowlisted types with a registered handler to the registry and
/// everything else to the legacy interpreter
pub struct HybridStepExecutor {
    legacy: LegacyStepExecutor,
    actions: ActionsStepExecutor,
    allowlist: BTreeSet<NodeType>,
}

impl HybridStepExecutor {
    pub fn new(
        interpreter: Arc<dyn LegacyInterpreter>,
        registry: Arc<dyn ActionRegistry>,
        allowlist: BTreeSet<NodeType>,
    ) -> Self {
        Self {
            legacy: LegacyStepExecutor::new(interpreter),
            actions: ActionsStepExecutor::new(registry),
            allowlist,
        }
    }
}

#[async_trait]
impl StepExecutor for HybridStepExecutor {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Hybrid
    }

    fn supports(&self, _kind: &NodeType) -> bool {
        true
    }

    fn route(&self, kind: &NodeType) -> ExecutorKind {
        if self.allowlist.contains(kind) && self.actions.supports(kind) {
            ExecutorKind::Actions
        } else {
            ExecutorKind::Legacy
        }
    }

    async fn execute(
        &self,
        ctx: &mut ExecCtx,
        step: &Step,
        overrides: ExecutionOverrides,
    ) -> Result<StepOutcome, FlowError> {
        let route = self.route(&step.kind);
        debug!(step = %step.id, kind = %step.kind, ?route, "hybrid routing");
        match route {
            ExecutorKind::Actions => self.actions.execute(ctx, step, overrides).await,
            ExecutorKind::Legacy => self.legacy.execute(ctx, step, overrides).await,
        }
    }
}

/// Resolved executor wiring for a run
#[derive(Clone)]
pub enum ExecutionStrategy {
    Legacy,
    Actions {
        registry: Arc<dyn ActionRegistry>,
    },
    Hybrid {
        registry: Arc<dyn ActionRegistry>,
        allowlist: BTreeSet<NodeType>,
    },
}

impl ExecutionStrategy {
    /// Fails when the mode needs a registry and none was supplied.
    pub fn resolve(
        config: &ExecutionModeConfig,
        registry: Option<Arc<dyn ActionRegistry>>,
    ) -> Result<Self, FlowError> {
        match (config.mode, registry) {
            (ExecutionMode::Legacy, _) => Ok(ExecutionStrategy::Legacy),
            (ExecutionMode::Actions, Some(registry)) => Ok(ExecutionStrategy::Actions { registry }),
            (ExecutionMode::Hybrid, Some(registry)) => Ok(ExecutionStrategy::Hybrid {
                registry,
                allowlist: config.effective_allowlist(),
            }),
            (mode, None) => Err(FlowError::Configuration(format!(
                "execution mode '{mode}' requires an action registry"
            ))),
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        match self {
            ExecutionStrategy::Legacy => ExecutionMode::Legacy,
            ExecutionStrategy::Actions { .. } => ExecutionMode::Actions,
            ExecutionStrategy::Hybrid { .. } => ExecutionMode::Hybrid,
        }
    }
}

/// Builds the step executor for the configured mode.
pub fn create_step_executor(
    config: &ExecutionModeConfig,
    interpreter: Arc<dyn LegacyInterpreter>,
    registry: Option<Arc<dyn ActionRegistry>>,
) -> Result<Arc<dyn StepExecutor>, FlowError> {
    let strategy = ExecutionStrategy::resolve(config, registry)?;
    info!(mode = %strategy.mode(), "creating step executor");
    let executor: Arc<dyn StepExecutor> = match strategy {
        ExecutionStrategy::Legacy => Arc::new(LegacyStepExecutor::new(interpreter)),
        ExecutionStrategy::Actions { registry } => Arc::new(ActionsStepExecutor::new(registry)),
        ExecutionStrategy::Hybrid {
            registry,
            allowlist,
        } => Arc::new(HybridStepExecutor::new(interpreter, registry, allowlist)),
    };
    Ok(executor)
}
