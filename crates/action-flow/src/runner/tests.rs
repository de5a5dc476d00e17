use super::*;
use crate::registry::{
    Action, ActionExecutionContext, ActionHandler, ActionResult, InMemoryActionRegistry,
};
use crate::types::{RunStatus, StepRunStatus};
use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;
use soulflow_core_types::{Edge, EdgeLabel, Node, NodeType, VariableDecl};
use std::sync::atomic::{AtomicU32, Ordering};

/// Records step ids; fails a step while its `failTimes` budget lasts.
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, u64>>,
    cancel_after: Mutex<Option<(String, CancellationToken)>>,
}

impl Recorder {
    fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl LegacyInterpreter for Recorder {
    async fn execute_step(&self, ctx: &mut ExecCtx, step: &Step) -> Result<Option<Value>, FlowError> {
        self.seen.lock().push(step.id.clone());

        if let Some((id, token)) = self.cancel_after.lock().as_ref() {
            if *id == step.id {
                token.cancel();
            }
        }

        let budget = step.field("failTimes").and_then(Value::as_u64).unwrap_or(0);
        let mut failures = self.failures.lock();
        let used = failures.entry(step.id.clone()).or_insert(0);
        if *used < budget {
            *used += 1;
            return Err(FlowError::StepFailed {
                step_id: step.id.clone(),
                reason: format!("failure {used}"),
            });
        }

        if let Some(name) = step.field("saveAs").and_then(Value::as_str) {
            ctx.set_variable(name, json!(step.id));
        }
        Ok(None)
    }
}

fn legacy_runner(recorder: Arc<Recorder>) -> FlowRunner {
    FlowRunner::new(&ExecutionModeConfig::default(), recorder, None).unwrap()
}

fn delay(id: &str) -> Step {
    Step::new(id, NodeType::Delay).with_field("ms", json!(1))
}

#[tokio::test]
async fn linear_flow_runs_in_order_with_seeded_variables() {
    let recorder = Arc::new(Recorder::default());
    let mut flow = Flow::new("f1", "linear").with_steps(vec![
        delay("a"),
        delay("b").with_field("saveAs", json!("last")),
        delay("c"),
    ]);
    flow.variables = vec![VariableDecl {
        name: "user".into(),
        default: Some(json!("ada")),
        sensitive: false,
        label: None,
    }];

    let report = legacy_runner(recorder.clone())
        .run(&flow, RunOptions::default().with_variable("extra", json!(1)))
        .await
        .unwrap();

    assert_eq!(recorder.seen(), vec!["a", "b", "c"]);
    assert_eq!(report.status, RunStatus::Succeeded);
    assert_eq!(report.mode, ExecutionMode::Legacy);
    assert_eq!(report.variables.get("user"), Some(&json!("ada")));
    assert_eq!(report.variables.get("extra"), Some(&json!(1)));
    assert_eq!(report.variables.get("last"), Some(&json!("b")));
    assert!(report.steps.iter().all(|s| s.executor == Some(ExecutorKind::Legacy)));
}

#[tokio::test]
async fn graph_flow_follows_default_edges() {
    let recorder = Arc::new(Recorder::default());
    let nodes = vec![
        Node::new("c", NodeType::Delay),
        Node::new("a", NodeType::Delay),
        Node::new("b", NodeType::Delay),
    ];
    let edges = vec![
        Edge::new("e1", "a", "b", Some(EdgeLabel::Default)),
        Edge::new("e2", "b", "c", None),
    ];
    let flow = Flow::new("f2", "graph")
        .with_steps(vec![delay("ignored")])
        .with_graph(nodes, edges);

    let report = legacy_runner(recorder.clone())
        .run(&flow, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(recorder.seen(), vec!["a", "b", "c"]);
    assert!(report.is_success());
}

#[tokio::test]
async fn cyclic_graph_runs_in_declaration_order_and_logs() {
    let recorder = Arc::new(Recorder::default());
    let nodes = vec![Node::new("x", NodeType::Delay), Node::new("y", NodeType::Delay)];
    let edges = vec![
        Edge::new("e1", "x", "y", None),
        Edge::new("e2", "y", "x", None),
    ];
    let flow = Flow::new("f3", "cycle").with_graph(nodes, edges);

    let report = legacy_runner(recorder.clone())
        .run(&flow, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(recorder.seen(), vec!["x", "y"]);
    assert!(report.log.iter().any(|entry| entry.message.contains("cycle")));
}

#[tokio::test]
async fn preflight_failure_runs_nothing() {
    let recorder = Arc::new(Recorder::default());
    let flow = Flow::new("f4", "invalid").with_steps(vec![
        delay("ok"),
        Step::new("bad", NodeType::Navigate).with_field("url", json!("  ")),
    ]);

    let err = legacy_runner(recorder.clone())
        .run(&flow, RunOptions::default())
        .await
        .unwrap_err();

    match err {
        FlowError::PreflightFailed(validation) => {
            assert_eq!(validation.total_errors, 1);
            assert_eq!(validation.node_errors["bad"], vec!["missing url".to_string()]);
        }
        other => panic!("expected pre-flight failure, got {other:?}"),
    }
    assert!(recorder.seen().is_empty());
}

#[tokio::test]
async fn retry_policy_reruns_within_the_step() {
    let recorder = Arc::new(Recorder::default());
    let flow = Flow::new("f5", "retry").with_steps(vec![
        delay("flaky")
            .with_field("failTimes", json!(2))
            .with_field("retry", json!({"count": 2, "interval": 1})),
        delay("after"),
    ]);

    let report = legacy_runner(recorder.clone())
        .run(&flow, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(recorder.seen(), vec!["flaky", "flaky", "flaky", "after"]);
    let flaky = report.step("flaky").unwrap();
    assert_eq!(flaky.status, StepRunStatus::Succeeded);
    assert_eq!(flaky.attempts, 3);
}

#[tokio::test]
async fn stop_strategy_halts_at_failure() {
    let recorder = Arc::new(Recorder::default());
    let flow = Flow::new("f6", "stop").with_steps(vec![
        delay("a"),
        delay("b").with_field("failTimes", json!(5)),
        delay("c"),
    ]);

    let report = legacy_runner(recorder.clone())
        .run(&flow, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(recorder.seen(), vec!["a", "b"]);
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.steps.len(), 2);
    assert!(report.error.as_deref().unwrap_or_default().contains("step b failed"));
}

#[tokio::test]
async fn continue_strategy_runs_remaining_steps() {
    let recorder = Arc::new(Recorder::default());
    let flow = Flow::new("f7", "continue").with_steps(vec![
        delay("a").with_field("failTimes", json!(1)),
        delay("b"),
    ]);

    let report = legacy_runner(recorder.clone())
        .run(
            &flow,
            RunOptions::default().with_strategy(FailureStrategy::Continue),
        )
        .await
        .unwrap();

    assert_eq!(recorder.seen(), vec!["a", "b"]);
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.step("b").unwrap().status, StepRunStatus::Succeeded);
}

#[tokio::test]
async fn disabled_steps_are_skipped() {
    let recorder = Arc::new(Recorder::default());
    let flow = Flow::new("f8", "disabled").with_steps(vec![
        delay("a").with_field("disabled", json!(true)),
        delay("b"),
    ]);

    let report = legacy_runner(recorder.clone())
        .run(&flow, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(recorder.seen(), vec!["b"]);
    assert_eq!(report.step("a").unwrap().status, StepRunStatus::Skipped);
    assert!(report.is_success());
}

#[tokio::test]
async fn cancellation_is_observed_between_steps() {
    let recorder = Arc::new(Recorder::default());
    let token = CancellationToken::new();
    *recorder.cancel_after.lock() = Some(("a".to_string(), token.clone()));
    let flow = Flow::new("f9", "cancel").with_steps(vec![delay("a"), delay("b")]);

    let report = legacy_runner(recorder.clone())
        .run(&flow, RunOptions::default().with_cancel(token))
        .await
        .unwrap();

    assert_eq!(recorder.seen(), vec!["a"]);
    assert_eq!(report.status, RunStatus::Cancelled);
    assert_eq!(report.steps.len(), 1);
}

#[tokio::test]
async fn cancelled_token_yields_partial_report_not_error() {
    let recorder = Arc::new(Recorder::default());
    let token = CancellationToken::new();
    token.cancel();
    let flow = Flow::new("f9b", "cancel early").with_steps(vec![delay("a")]);

    let result = legacy_runner(recorder.clone())
        .run(&flow, RunOptions::default().with_cancel(token))
        .await;

    let report = result.expect("cancellation is reported, not raised");
    assert_eq!(report.status, RunStatus::Cancelled);
    assert!(report.steps.is_empty());
    assert!(recorder.seen().is_empty());
    assert!(report
        .log
        .iter()
        .any(|entry| entry.message.contains("run cancelled")));
}

struct CountingKey {
    calls: AtomicU32,
}

#[async_trait]
impl ActionHandler for CountingKey {
    fn kind(&self) -> NodeType {
        NodeType::Key
    }

    async fn run(&self, _ctx: &mut ActionExecutionContext, _action: &Action) -> ActionResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ActionResult::failed("key rejected")
    }
}

fn key_step() -> Step {
    Step::new("k", NodeType::Key)
        .with_field("keys", json!("Enter"))
        .with_field("retry", json!({"count": 2, "interval": 1}))
}

#[tokio::test]
async fn runner_owns_retry_when_registry_retry_is_skipped() {
    let handler = Arc::new(CountingKey {
        calls: AtomicU32::new(0),
    });
    let registry: Arc<dyn ActionRegistry> =
        Arc::new(InMemoryActionRegistry::new().with_handler(handler.clone()));
    let config = ExecutionModeConfig::default().with_mode(ExecutionMode::Hybrid);
    let runner = FlowRunner::new(&config, Arc::new(Recorder::default()), Some(registry)).unwrap();

    let flow = Flow::new("f10", "hybrid").with_steps(vec![key_step()]);
    let report = runner.run(&flow, RunOptions::default()).await.unwrap();

    assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
    let step = report.step("k").unwrap();
    assert_eq!(step.executor, Some(ExecutorKind::Actions));
    assert_eq!(step.attempts, 3);
}

#[tokio::test]
async fn registry_owns_retry_when_not_skipped() {
    let handler = Arc::new(CountingKey {
        calls: AtomicU32::new(0),
    });
    let registry: Arc<dyn ActionRegistry> =
        Arc::new(InMemoryActionRegistry::new().with_handler(handler.clone()));
    let mut config = ExecutionModeConfig::default().with_mode(ExecutionMode::Actions);
    config.skip_actions_retry = false;
    let runner = FlowRunner::new(&config, Arc::new(Recorder::default()), Some(registry)).unwrap();

    let flow = Flow::new("f11", "actions").with_steps(vec![key_step()]);
    let report = runner.run(&flow, RunOptions::default()).await.unwrap();

    // three registry attempts, no extra runner attempts on top
    assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.step("k").unwrap().attempts, 1);
    assert_eq!(report.status, RunStatus::Failed);
}

struct Stalling;

#[async_trait]
impl LegacyInterpreter for Stalling {
    async fn execute_step(&self, _ctx: &mut ExecCtx, _step: &Step) -> Result<Option<Value>, FlowError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(None)
    }
}

#[tokio::test]
async fn run_deadline_is_enforced() {
    let runner = FlowRunner::new(&ExecutionModeConfig::default(), Arc::new(Stalling), None).unwrap();
    let flow = Flow::new("f12", "slow").with_steps(vec![delay("a")]);
    let err = runner
        .run(&flow, RunOptions::default().with_timeout(20))
        .await
        .unwrap_err();
    assert!(matches!(err, FlowError::Timeout(20)));
}

#[test]
fn route_plan_previews_hybrid_routing() {
    let registry: Arc<dyn ActionRegistry> = Arc::new(
        InMemoryActionRegistry::new().with_handler(Arc::new(CountingKey {
            calls: AtomicU32::new(0),
        })),
    );
    let config = ExecutionModeConfig::default().with_mode(ExecutionMode::Hybrid);
    let runner = FlowRunner::new(&config, Arc::new(Recorder::default()), Some(registry)).unwrap();
    let flow = Flow::new("f13", "preview").with_steps(vec![delay("d"), key_step()]);

    let plan: Vec<(String, ExecutorKind)> = runner
        .route_plan(&flow)
        .unwrap()
        .into_iter()
        .map(|(step, route)| (step.id, route))
        .collect();
    assert_eq!(
        plan,
        vec![
            ("d".to_string(), ExecutorKind::Legacy),
            ("k".to_string(), ExecutorKind::Actions)
        ]
    );
}
