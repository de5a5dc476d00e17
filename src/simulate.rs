//! Simulated backend for the CLI.
//!
//! Steps are recorded instead of touching a browser. `delay` waits for its
//! configured time (capped) and `saveAs` targets receive a placeholder value.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use action_flow::{
    Action, ActionExecutionContext, ActionHandler, ActionResult, ExecCtx, ExecutorKind, FlowError,
    InMemoryActionRegistry, LegacyInterpreter,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use soulflow_core_types::{NodeConfig, NodeType, Step};
use soulflow_flow_graph::{map_step_to_config, spec_for, NodeSpec};

const MAX_SIMULATED_DELAY_MS: u64 = 5_000;

/// One recorded dispatch
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dispatch {
    pub step_id: String,
    #[serde(rename = "type")]
    pub kind: NodeType,
    pub executor: ExecutorKind,
    pub summary: String,
    pub skip_nav_wait: bool,
}

#[derive(Debug, Default)]
pub struct DispatchRecorder {
    entries: Mutex<Vec<Dispatch>>,
}

impl DispatchRecorder {
    fn record(&self, dispatch: Dispatch) {
        self.entries.lock().push(dispatch);
    }

    pub fn dispatches(&self) -> Vec<Dispatch> {
        self.entries.lock().clone()
    }
}

async fn simulate(kind: &NodeType, config: &NodeConfig, vars: &mut HashMap<String, Value>) -> Value {
    if *kind == NodeType::Delay {
        let ms = config
            .get("ms")
            .and_then(Value::as_u64)
            .unwrap_or(0)
            .min(MAX_SIMULATED_DELAY_MS);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
    if let Some(target) = config
        .get("saveAs")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
    {
        vars.insert(target.to_string(), json!(format!("<{kind}>")));
    }
    json!({ "simulated": true })
}

/// Legacy interpreter stand-in
pub struct SimulatedInterpreter {
    recorder: Arc<DispatchRecorder>,
}

impl SimulatedInterpreter {
    pub fn new(recorder: Arc<DispatchRecorder>) -> Self {
        Self { recorder }
    }
}

#[async_trait]
impl LegacyInterpreter for SimulatedInterpreter {
    async fn execute_step(&self, ctx: &mut ExecCtx, step: &Step) -> Result<Option<Value>, FlowError> {
        let config = map_step_to_config(step);
        let summary = spec_for(&step.kind).summarize(&config);
        ctx.logger
            .info(Some(&step.id), format!("legacy {}: {}", step.kind, summary));
        let output = simulate(&step.kind, &config, &mut ctx.vars).await;
        self.recorder.record(Dispatch {
            step_id: step.id.clone(),
            kind: step.kind.clone(),
            executor: ExecutorKind::Legacy,
            summary,
            skip_nav_wait: false,
        });
        Ok(Some(output))
    }
}

/// Registry handler stand-in for one type
pub struct SimulatedHandler {
    kind: NodeType,
    recorder: Arc<DispatchRecorder>,
}

#[async_trait]
impl ActionHandler for SimulatedHandler {
    fn kind(&self) -> NodeType {
        self.kind.clone()
    }

    async fn run(&self, ctx: &mut ActionExecutionContext, action: &Action) -> ActionResult {
        let summary = spec_for(&action.kind).summarize(&action.params);
        ctx.log
            .info(Some(&action.id), format!("action {}: {}", action.kind, summary));
        let output = simulate(&action.kind, &action.params, &mut ctx.vars).await;
        self.recorder.record(Dispatch {
            step_id: action.id.clone(),
            kind: action.kind.clone(),
            executor: ExecutorKind::Actions,
            summary,
            skip_nav_wait: ctx.skip_nav_wait(),
        });
        ActionResult::success(Some(output))
    }
}

/// Registry with a simulated handler for every known type.
pub fn simulated_registry(recorder: Arc<DispatchRecorder>) -> InMemoryActionRegistry {
    let registry = InMemoryActionRegistry::new();
    for kind in NodeType::KNOWN {
        registry.register(Arc::new(SimulatedHandler {
            kind: kind.clone(),
            recorder: Arc::clone(&recorder),
        }));
    }
    registry
}
