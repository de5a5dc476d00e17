//! Core types for flow execution

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use soulflow_core_types::NodeType;
use soulflow_policy_center::ExecutionMode;
use std::collections::HashMap;

use crate::log::{LogEntry, RunLog};

/// Which executor actually handled a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    Legacy,
    Actions,
}

/// Result status reported by an executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed { message: String },
}

/// Uniform envelope returned by every step executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub step_id: String,
    pub executor: ExecutorKind,
    #[serde(flatten)]
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

impl StepOutcome {
    pub fn success(step_id: impl Into<String>, executor: ExecutorKind, output: Option<Value>) -> Self {
        Self {
            step_id: step_id.into(),
            executor,
            status: StepStatus::Success,
            output,
        }
    }

    pub fn failed(step_id: impl Into<String>, executor: ExecutorKind, message: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            executor,
            status: StepStatus::Failed {
                message: message.into(),
            },
            output: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, StepStatus::Success)
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            StepStatus::Success => None,
            StepStatus::Failed { message } => Some(message),
        }
    }
}

/// What the runner does once a step has exhausted its retries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStrategy {
    /// Halt the run at the failing step
    #[default]
    Stop,
    /// Record the failure and move on
    Continue,
}

impl std::str::FromStr for FailureStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stop" | "abort" => Ok(FailureStrategy::Stop),
            "continue" => Ok(FailureStrategy::Continue),
            other => Err(format!("unknown failure strategy: {other}")),
        }
    }
}

/// Per-run execution context handed to the interpreter and handlers
#[derive(Debug, Clone, Default)]
pub struct ExecCtx {
    /// Run variables, read and written by steps
    pub vars: HashMap<String, Value>,
    /// Tab the run is attached to
    pub tab_id: Option<i64>,
    pub logger: RunLog,
}

impl ExecCtx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vars(mut self, vars: HashMap<String, Value>) -> Self {
        self.vars = vars;
        self
    }

    pub fn with_tab(mut self, tab_id: i64) -> Self {
        self.tab_id = Some(tab_id);
        self
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn get_variable(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepRunStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// Per-step record in a run report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub node_id: String,

    #[serde(rename = "type")]
    pub step_type: NodeType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<ExecutorKind>,

    pub status: StepRunStatus,

    /// Number of times the executor was invoked
    pub attempts: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    pub started_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    pub latency_ms: u64,
}

impl StepResult {
    pub fn new(node_id: impl Into<String>, step_type: NodeType) -> Self {
        Self {
            node_id: node_id.into(),
            step_type,
            executor: None,
            status: StepRunStatus::Failed,
            attempts: 0,
            error: None,
            output: None,
            started_at: Utc::now(),
            finished_at: None,
            latency_ms: 0,
        }
    }

    pub fn with_outcome(mut self, outcome: &StepOutcome) -> Self {
        self.executor = Some(outcome.executor);
        match &outcome.status {
            StepStatus::Success => {
                self.status = StepRunStatus::Succeeded;
                self.output = outcome.output.clone();
                self.error = None;
            }
            StepStatus::Failed { message } => {
                self.status = StepRunStatus::Failed;
                self.error = Some(message.clone());
            }
        }
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.status = StepRunStatus::Failed;
        self.error = Some(error.into());
        self
    }

    pub fn skipped(mut self) -> Self {
        self.status = StepRunStatus::Skipped;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn finish(mut self) -> Self {
        let now = Utc::now();
        self.latency_ms = (now - self.started_at).num_milliseconds().max(0) as u64;
        self.finished_at = Some(now);
        self
    }

    pub fn is_failed(&self) -> bool {
        self.status == StepRunStatus::Failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Succeeded,
    Failed,
    Cancelled,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub flow_id: String,
    pub mode: ExecutionMode,
    pub status: RunStatus,
    pub steps: Vec<StepResult>,
    pub variables: HashMap<String, Value>,
    pub log: Vec<LogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub latency_ms: u64,
}

impl RunReport {
    pub fn new(flow_id: impl Into<String>, mode: ExecutionMode) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            flow_id: flow_id.into(),
            mode,
            status: RunStatus::Succeeded,
            steps: Vec::new(),
            variables: HashMap::new(),
            log: Vec::new(),
            error: None,
            started_at: Utc::now(),
            finished_at: None,
            latency_ms: 0,
        }
    }

    pub fn with_step(mut self, result: StepResult) -> Self {
        self.steps.push(result);
        self
    }

    /// Marks the run failed, keeping the first error seen.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.status = RunStatus::Failed;
        if self.error.is_none() {
            self.error = Some(error.into());
        }
        self
    }

    pub fn cancelled(mut self) -> Self {
        self.status = RunStatus::Cancelled;
        self
    }

    pub fn finish(mut self, ctx: &ExecCtx) -> Self {
        let now = Utc::now();
        self.latency_ms = (now - self.started_at).num_milliseconds().max(0) as u64;
        self.finished_at = Some(now);
        self.variables = ctx.vars.clone();
        self.log = ctx.logger.entries();
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn step(&self, node_id: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.node_id == node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcome_serializes_flat_status() {
        let outcome = StepOutcome::failed("s1", ExecutorKind::Actions, "nope");
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            value,
            json!({"stepId": "s1", "executor": "actions", "status": "failed", "message": "nope"})
        );
    }

    #[test]
    fn step_result_takes_outcome() {
        let outcome = StepOutcome::success("s1", ExecutorKind::Legacy, Some(json!(1)));
        let result = StepResult::new("s1", NodeType::Fill)
            .with_outcome(&outcome)
            .with_attempts(2)
            .finish();
        assert_eq!(result.status, StepRunStatus::Succeeded);
        assert_eq!(result.executor, Some(ExecutorKind::Legacy));
        assert_eq!(result.attempts, 2);
        assert!(result.finished_at.is_some());
    }

    #[test]
    fn report_keeps_first_error() {
        let report = RunReport::new("f", ExecutionMode::Legacy)
            .with_error("first")
            .with_error("second");
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.error.as_deref(), Some("first"));
    }

    #[test]
    fn failure_strategy_parses() {
        assert_eq!("continue".parse::<FailureStrategy>().unwrap(), FailureStrategy::Continue);
        assert_eq!("Stop".parse::<FailureStrategy>().unwrap(), FailureStrategy::Stop);
        assert!("sideways".parse::<FailureStrategy>().is_err());
    }
}
