//! Flow runner
//!
//! Validates a flow, schedules its steps and drives them through the step
//! executor one at a time. Retry happens inside a step's turn; cancellation
//! is observed between steps.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use soulflow_core_types::{Flow, Step};
use soulflow_flow_graph::{
    map_config_to_step, schedule, steps_for_flow, steps_to_nodes, validate_flow, CycleDiagnostic,
};
use soulflow_policy_center::{ExecutionMode, ExecutionModeConfig};
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapter::ExecutionOverrides;
use crate::errors::FlowError;
use crate::executors::{create_step_executor, StepExecutor};
use crate::legacy::LegacyInterpreter;
use crate::log::RunLog;
use crate::registry::ActionRegistry;
use crate::strategies::{DefaultFailureHandler, FailureDecision, FailureHandler};
use crate::types::{ExecCtx, ExecutorKind, FailureStrategy, RunReport, StepResult};

/// Per-run options
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub failure_strategy: FailureStrategy,
    /// Values layered over the flow's declared variable defaults
    pub variables: HashMap<String, Value>,
    pub tab_id: Option<i64>,
    pub cancel: CancellationToken,
    /// Whole-run deadline
    pub timeout_ms: Option<u64>,
}

impl RunOptions {
    pub fn with_strategy(mut self, strategy: FailureStrategy) -> Self {
        self.failure_strategy = strategy;
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

pub struct FlowRunner {
    executor: Arc<dyn StepExecutor>,
    overrides: ExecutionOverrides,
    failure_handler: Arc<dyn FailureHandler>,
}

impl FlowRunner {
    /// Builds a runner for the configured mode. Fails fast when the mode
    /// needs a registry that was not supplied.
    pub fn new(
        config: &ExecutionModeConfig,
        interpreter: Arc<dyn LegacyInterpreter>,
        registry: Option<Arc<dyn ActionRegistry>>,
    ) -> Result<Self, FlowError> {
        let executor = create_step_executor(config, interpreter, registry)?;
        let overrides = ExecutionOverrides {
            skip_retry: config.skip_actions_retry,
            skip_nav_wait: config.skip_actions_nav_wait,
        };
        Ok(Self::with_executor(executor, overrides))
    }

    pub fn with_executor(executor: Arc<dyn StepExecutor>, overrides: ExecutionOverrides) -> Self {
        Self {
            executor,
            overrides,
            failure_handler: Arc::new(DefaultFailureHandler::new()),
        }
    }

    pub fn with_failure_handler(mut self, handler: Arc<dyn FailureHandler>) -> Self {
        self.failure_handler = handler;
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.executor.mode()
    }

    /// Node validation over whichever representation is authoritative.
    pub fn preflight(flow: &Flow) -> Result<(), FlowError> {
        let validation = if flow.is_graph_authoritative() {
            validate_flow(&flow.nodes)
        } else {
            validate_flow(&steps_to_nodes(&flow.steps))
        };
        if validation.is_valid() {
            Ok(())
        } else {
            Err(FlowError::PreflightFailed(validation))
        }
    }

    /// Execution-ordered steps plus the cycle diagnostic, if ordering fell
    /// back to declaration order.
    pub fn plan(flow: &Flow) -> (Vec<Step>, Option<CycleDiagnostic>) {
        if flow.is_graph_authoritative() && !flow.edges.is_empty() {
            let schedule = schedule(&flow.nodes, &flow.edges);
            let steps = schedule.order.iter().map(map_config_to_step).collect();
            (steps, schedule.fallback)
        } else {
            (steps_for_flow(flow), None)
        }
    }

    /// Steps in execution order with the path each would take, without
    /// running anything.
    pub fn route_plan(&self, flow: &Flow) -> Result<Vec<(Step, ExecutorKind)>, FlowError> {
        Self::preflight(flow)?;
        let (steps, _) = Self::plan(flow);
        Ok(steps
            .into_iter()
            .map(|step| {
                let route = self.executor.route(&step.kind);
                (step, route)
            })
            .collect())
    }

    pub async fn run(&self, flow: &Flow, options: RunOptions) -> Result<RunReport, FlowError> {
        info!("Executing flow: {} ({})", flow.name, flow.id);

        Self::preflight(flow)?;
        let (steps, cycle) = Self::plan(flow);

        let mut ctx = ExecCtx {
            vars: seed_variables(flow, &options.variables),
            tab_id: options.tab_id,
            logger: RunLog::new(),
        };
        if let Some(diagnostic) = cycle {
            ctx.logger.warn(
                None,
                format!(
                    "default edges form a cycle; {} node(s) run in declaration order",
                    diagnostic.unscheduled.len()
                ),
            );
        }
        ctx.logger.info(
            None,
            format!("running {} step(s) in {} mode", steps.len(), self.mode()),
        );

        let report = RunReport::new(&flow.id, self.mode());
        let report = match options.timeout_ms {
            Some(ms) => {
                match timeout(
                    Duration::from_millis(ms),
                    self.run_steps(&steps, &mut ctx, &options, report),
                )
                .await
                {
                    Ok(report) => report,
                    Err(_) => {
                        warn!("Flow {} timed out after {}ms", flow.id, ms);
                        return Err(FlowError::Timeout(ms));
                    }
                }
            }
            None => self.run_steps(&steps, &mut ctx, &options, report).await,
        };

        let report = report.finish(&ctx);
        if report.is_success() {
            info!("Flow {} completed successfully", flow.id);
        } else {
            warn!("Flow {} finished with status {:?}", flow.id, report.status);
        }
        Ok(report)
    }

    async fn run_steps(
        &self,
        steps: &[Step],
        ctx: &mut ExecCtx,
        options: &RunOptions,
        mut report: RunReport,
    ) -> RunReport {
        for (i, step) in steps.iter().enumerate() {
            if options.cancel.is_cancelled() {
                ctx.logger.warn(Some(&step.id), "run cancelled before step");
                return report.cancelled();
            }

            if step.is_disabled() {
                ctx.logger.info(Some(&step.id), "step disabled, skipping");
                report = report.with_step(StepResult::new(&step.id, step.kind.clone()).skipped().finish());
                continue;
            }

            debug!("Executing step {}/{}: {}", i + 1, steps.len(), step.id);
            let (result, halt) = self.run_step(step, ctx, options.failure_strategy).await;
            if result.is_failed() {
                let error = result.error.as_deref().unwrap_or("step failed");
                report = report.with_error(format!("step {} failed: {}", step.id, error));
            }
            report = report.with_step(result);
            if halt {
                break;
            }
        }
        report
    }

    /// Runs one step to completion, retries included. The flag says whether
    /// the run must halt.
    async fn run_step(
        &self,
        step: &Step,
        ctx: &mut ExecCtx,
        strategy: FailureStrategy,
    ) -> (StepResult, bool) {
        let mut result = StepResult::new(&step.id, step.kind.clone());
        let mut attempt = 1;

        loop {
            let (error, retry) = match self.executor.execute(ctx, step, self.overrides).await {
                Ok(outcome) if outcome.is_success() => {
                    ctx.logger.info(
                        Some(&step.id),
                        format!("{} completed via {:?}", step.kind, outcome.executor),
                    );
                    let result = result.with_outcome(&outcome).with_attempts(attempt).finish();
                    return (result, false);
                }
                Ok(outcome) => {
                    result = result.with_outcome(&outcome);
                    // the registry has already applied the step's own policy
                    let retry = if outcome.executor == ExecutorKind::Actions
                        && !self.overrides.skip_retry
                    {
                        None
                    } else {
                        step.retry()
                    };
                    let error = outcome.error_message().unwrap_or("step failed").to_string();
                    (error, retry)
                }
                Err(err) => (err.to_string(), None),
            };

            ctx.logger
                .error(Some(&step.id), format!("attempt {attempt} failed: {error}"));

            match self
                .failure_handler
                .handle_failure(&step.id, retry, strategy, &error, attempt)
                .await
            {
                FailureDecision::Retry { attempt: next, .. } => attempt = next,
                FailureDecision::Abort(message) => {
                    return (result.with_error(message).with_attempts(attempt).finish(), true);
                }
                FailureDecision::Continue(message) => {
                    return (result.with_error(message).with_attempts(attempt).finish(), false);
                }
            }
        }
    }
}

fn seed_variables(flow: &Flow, overrides: &HashMap<String, Value>) -> HashMap<String, Value> {
    let mut vars: HashMap<String, Value> = flow
        .variables
        .iter()
        .filter_map(|decl| decl.default.clone().map(|value| (decl.name.clone(), value)))
        .collect();
    vars.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    vars
}

#[cfg(test)]
mod tests;
