//! Action registry contract and the in-memory implementation.
//!
//! A registry maps step types to handlers. Dispatch goes through
//! [`ActionRegistry::execute`], which owns the per-action retry and timeout
//! policy; handlers themselves only run a single attempt.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use soulflow_core_types::{NodeConfig, NodeType, RetryPolicy, Step};
use tracing::{debug, warn};

use crate::log::RunLog;

/// Per-action retry and timeout policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// A step rewritten into the registry's shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeType,
    pub params: NodeConfig,
    #[serde(default)]
    pub policy: ActionPolicy,
}

impl Action {
    /// Builds an action from a step. Policy fields are lifted out of the
    /// parameters into [`ActionPolicy`].
    pub fn from_step(step: &Step) -> Self {
        let mut params = step.fields.clone();
        params.remove("retry");
        params.remove("timeoutMs");
        Self {
            id: step.id.clone(),
            kind: step.kind.clone(),
            params,
            policy: ActionPolicy {
                retry: step.retry(),
                timeout_ms: step.timeout_ms(),
            },
        }
    }
}

/// Execution flags forwarded to handlers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFlags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_nav_wait: Option<bool>,
}

/// Context visible to action handlers
#[derive(Debug, Clone, Default)]
pub struct ActionExecutionContext {
    pub vars: HashMap<String, Value>,
    pub tab_id: Option<i64>,
    pub log: RunLog,
    /// Only present when a flag is actually set
    pub execution: Option<ExecutionFlags>,
}

impl ActionExecutionContext {
    pub fn skip_nav_wait(&self) -> bool {
        self.execution
            .as_ref()
            .and_then(|flags| flags.skip_nav_wait)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn success(output: Option<Value>) -> Self {
        Self {
            status: ActionStatus::Success,
            output,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: ActionStatus::Failed,
            output: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ActionStatus::Success
    }
}

/// Runs one attempt of one action type
#[async_trait]
pub trait ActionHandler: Send + Sync {
    fn kind(&self) -> NodeType;

    async fn run(&self, ctx: &mut ActionExecutionContext, action: &Action) -> ActionResult;
}

#[async_trait]
pub trait ActionRegistry: Send + Sync {
    /// Looks up the handler registered for a type
    fn get(&self, kind: &NodeType) -> Option<Arc<dyn ActionHandler>>;

    /// Dispatches an action, applying its policy
    async fn execute(&self, ctx: &mut ActionExecutionContext, action: &Action) -> ActionResult;
}

/// Registry keeping handlers in a map
#[derive(Default)]
pub struct InMemoryActionRegistry {
    handlers: RwLock<HashMap<NodeType, Arc<dyn ActionHandler>>>,
}

impl InMemoryActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(self, handler: Arc<dyn ActionHandler>) -> Self {
        self.register(handler);
        self
    }

    /// Registers a handler, replacing any previous one for the same type
    pub fn register(&self, handler: Arc<dyn ActionHandler>) {
        let kind = handler.kind();
        if self.handlers.write().insert(kind.clone(), handler).is_some() {
            debug!(kind = %kind, "replaced action handler");
        }
    }

    async fn run_once(
        handler: &Arc<dyn ActionHandler>,
        ctx: &mut ActionExecutionContext,
        action: &Action,
    ) -> ActionResult {
        match action.policy.timeout_ms {
            Some(ms) => {
                match tokio::time::timeout(Duration::from_millis(ms), handler.run(ctx, action)).await
                {
                    Ok(result) => result,
                    Err(_) => ActionResult::failed(format!("timed out after {ms}ms")),
                }
            }
            None => handler.run(ctx, action).await,
        }
    }
}

#[async_trait]
impl ActionRegistry for InMemoryActionRegistry {
    fn get(&self, kind: &NodeType) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.read().get(kind).cloned()
    }

    async fn execute(&self, ctx: &mut ActionExecutionContext, action: &Action) -> ActionResult {
        let Some(handler) = self.get(&action.kind) else {
            return ActionResult::failed(format!(
                "no action handler registered for type '{}'",
                action.kind
            ));
        };

        let max_attempts = action
            .policy
            .retry
            .as_ref()
            .map(RetryPolicy::max_attempts)
            .unwrap_or(1);

        let mut attempt = 1;
        loop {
            let result = Self::run_once(&handler, ctx, action).await;
            if result.is_success() || attempt >= max_attempts {
                return result;
            }
            let delay = action
                .policy
                .retry
                .as_ref()
                .map(|retry| retry.delay_for(attempt))
                .unwrap_or_default();
            warn!(
                action = %action.id,
                attempt,
                "action failed, retrying after {}ms: {}",
                delay.as_millis(),
                result.error.as_deref().unwrap_or("unknown error")
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use soulflow_core_types::Backoff;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        fail_times: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ActionHandler for Flaky {
        fn kind(&self) -> NodeType {
            NodeType::Fill
        }

        async fn run(&self, _ctx: &mut ActionExecutionContext, _action: &Action) -> ActionResult {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.fail_times {
                ActionResult::failed(format!("attempt {call}"))
            } else {
                ActionResult::success(Some(json!(call)))
            }
        }
    }

    struct Sleepy;

    #[async_trait]
    impl ActionHandler for Sleepy {
        fn kind(&self) -> NodeType {
            NodeType::Wait
        }

        async fn run(&self, _ctx: &mut ActionExecutionContext, _action: &Action) -> ActionResult {
            tokio::time::sleep(Duration::from_secs(5)).await;
            ActionResult::success(None)
        }
    }

    #[test]
    fn from_step_lifts_policy() {
        let step = Step::new("s1", NodeType::Fill)
            .with_field("value", json!("x"))
            .with_field("retry", json!({"count": 2, "interval": 10}))
            .with_field("timeoutMs", json!(500));
        let action = Action::from_step(&step);
        assert_eq!(action.params.len(), 1);
        assert_eq!(action.policy.timeout_ms, Some(500));
        assert_eq!(action.policy.retry.map(|r| r.count), Some(2));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let handler = Arc::new(Flaky {
            fail_times: 2,
            calls: AtomicU32::new(0),
        });
        let registry = InMemoryActionRegistry::new().with_handler(handler.clone());
        let mut action = Action::from_step(&Step::new("s1", NodeType::Fill));
        action.policy.retry = Some(RetryPolicy::new(2, 1, Backoff::None));

        let result = registry
            .execute(&mut ActionExecutionContext::default(), &action)
            .await;
        assert!(result.is_success());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn without_policy_runs_once() {
        let handler = Arc::new(Flaky {
            fail_times: 1,
            calls: AtomicU32::new(0),
        });
        let registry = InMemoryActionRegistry::new().with_handler(handler.clone());
        let action = Action::from_step(&Step::new("s1", NodeType::Fill));

        let result = registry
            .execute(&mut ActionExecutionContext::default(), &action)
            .await;
        assert_eq!(result.status, ActionStatus::Failed);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_fails_the_attempt() {
        let registry = InMemoryActionRegistry::new().with_handler(Arc::new(Sleepy));
        let mut action = Action::from_step(&Step::new("w", NodeType::Wait));
        action.policy.timeout_ms = Some(20);

        let result = registry
            .execute(&mut ActionExecutionContext::default(), &action)
            .await;
        assert_eq!(result.error.as_deref(), Some("timed out after 20ms"));
    }

    #[tokio::test]
    async fn unknown_type_fails() {
        let registry = InMemoryActionRegistry::new();
        let action = Action::from_step(&Step::new("s", NodeType::Click));
        let result = registry
            .execute(&mut ActionExecutionContext::default(), &action)
            .await;
        assert!(!result.is_success());
        assert!(registry.get(&NodeType::Click).is_none());
    }
}
