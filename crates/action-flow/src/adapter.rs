//! Turns a step into a registry dispatch.
//!
//! Variables written by the handler flow back into the run context after
//! dispatch.

use soulflow_core_types::Step;
use tracing::debug;

use crate::registry::{
    Action, ActionExecutionContext, ActionRegistry, ActionResult, ExecutionFlags,
};
use crate::types::ExecCtx;

/// Policy flags applied to registry dispatches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionOverrides {
    /// Drop the action's own retry policy
    pub skip_retry: bool,
    /// Tell handlers not to wait for navigation
    pub skip_nav_wait: bool,
}

/// Builds the handler context and action for a step.
pub fn prepare_dispatch(
    ctx: &ExecCtx,
    step: &Step,
    overrides: ExecutionOverrides,
) -> (ActionExecutionContext, Action) {
    let mut action = Action::from_step(step);
    if overrides.skip_retry {
        action.policy.retry = None;
    }

    let execution = overrides.skip_nav_wait.then(|| ExecutionFlags {
        skip_nav_wait: Some(true),
    });

    let action_ctx = ActionExecutionContext {
        vars: ctx.vars.clone(),
        tab_id: ctx.tab_id,
        log: ctx.logger.clone(),
        execution,
    };
    (action_ctx, action)
}

/// Dispatches a step through the registry.
pub async fn execute_via_registry(
    registry: &dyn ActionRegistry,
    ctx: &mut ExecCtx,
    step: &Step,
    overrides: ExecutionOverrides,
) -> ActionResult {
    let (mut action_ctx, action) = prepare_dispatch(ctx, step, overrides);
    debug!(step = %step.id, kind = %step.kind, ?overrides, "dispatching to action registry");
    let result = registry.execute(&mut action_ctx, &action).await;
    ctx.vars = action_ctx.vars;
    ctx.tab_id = action_ctx.tab_id;
    result
}
