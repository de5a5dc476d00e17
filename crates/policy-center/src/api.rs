use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use soulflow_core_types::NodeType;
use tokio::sync::{watch, Mutex};
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::errors::PolicyError;
use crate::model::{ExecutionMode, ModeSnapshot, PolicySource, RuntimeOverrideSpec};

pub const PATH_MODE: &str = "mode";
pub const PATH_ALLOWLIST: &str = "actions_allowlist";
pub const PATH_SKIP_RETRY: &str = "skip_actions_retry";
pub const PATH_SKIP_NAV_WAIT: &str = "skip_actions_nav_wait";

#[async_trait]
pub trait PolicyCenter: Send + Sync {
    async fn snapshot(&self) -> Arc<ModeSnapshot>;
    async fn apply_override(&self, override_spec: RuntimeOverrideSpec) -> Result<(), PolicyError>;
    fn subscribe(&self) -> watch::Receiver<Arc<ModeSnapshot>>;
    /// Sticky view for the duration of one run.
    async fn guard(&self) -> PolicyGuard;
}

struct OverrideEntry {
    value: Value,
    expires_at: Option<Instant>,
    /// Distinguishes re-applications of the same path for TTL expiry.
    generation: u64,
}

struct PolicyState {
    base: ModeSnapshot,
    snapshot: ModeSnapshot,
    overrides: HashMap<String, OverrideEntry>,
    rev_counter: u64,
    generation_counter: u64,
}

impl PolicyState {
    fn new(base: ModeSnapshot) -> Self {
        let rev_counter = base.rev;
        Self {
            base: base.clone(),
            snapshot: base,
            overrides: HashMap::new(),
            rev_counter,
            generation_counter: 0,
        }
    }

    fn recompute(&mut self) -> Result<(), PolicyError> {
        let now = Instant::now();
        self.overrides
            .retain(|_, entry| entry.expires_at.map_or(true, |expires| expires > now));

        let mut next = self.base.clone();
        for (path, entry) in &self.overrides {
            apply_override_to_snapshot(&mut next, path, &entry.value, PolicySource::RuntimeOverride)?;
        }
        self.rev_counter = self.rev_counter.saturating_add(1);
        next.rev = self.rev_counter;
        self.snapshot = next;
        Ok(())
    }
}

pub struct InMemoryPolicyCenter {
    state: Arc<Mutex<PolicyState>>,
    watch_tx: watch::Sender<Arc<ModeSnapshot>>,
}

impl InMemoryPolicyCenter {
    pub fn new(snapshot: ModeSnapshot) -> Self {
        let state = PolicyState::new(snapshot);
        let current = Arc::new(state.snapshot.clone());
        let (watch_tx, _watch_rx) = watch::channel(current);
        Self {
            state: Arc::new(Mutex::new(state)),
            watch_tx,
        }
    }
}

#[async_trait]
impl PolicyCenter for InMemoryPolicyCenter {
    async fn snapshot(&self) -> Arc<ModeSnapshot> {
        let guard = self.state.lock().await;
        Arc::new(guard.snapshot.clone())
    }

    async fn apply_override(&self, override_spec: RuntimeOverrideSpec) -> Result<(), PolicyError> {
        let path = canonical_path(&override_spec.path)
            .ok_or_else(|| PolicyError::UnsupportedPath(override_spec.path.clone()))?;
        let ttl = (override_spec.ttl_seconds > 0)
            .then(|| Duration::from_secs(override_spec.ttl_seconds));

        let mut guard = self.state.lock().await;
        guard.generation_counter += 1;
        let generation = guard.generation_counter;
        let previous = guard.overrides.insert(
            path.to_string(),
            OverrideEntry {
                value: override_spec.value.clone(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
                generation,
            },
        );
        if let Err(err) = guard.recompute() {
            match previous {
                Some(entry) => guard.overrides.insert(path.to_string(), entry),
                None => guard.overrides.remove(path),
            };
            return Err(err);
        }
        let snapshot = Arc::new(guard.snapshot.clone());
        drop(guard);

        info!(
            path,
            owner = %override_spec.owner,
            reason = %override_spec.reason,
            "execution mode override applied"
        );
        let _ = self.watch_tx.send(snapshot);

        if let Some(ttl) = ttl {
            let state = Arc::clone(&self.state);
            let watch_tx = self.watch_tx.clone();
            tokio::spawn(async move {
                sleep(ttl).await;
                let mut guard = state.lock().await;
                // A newer apply on the same path owns the entry now.
                let current = guard.overrides.get(path).map(|entry| entry.generation);
                if current != Some(generation) {
                    return;
                }
                guard.overrides.remove(path);
                match guard.recompute() {
                    Ok(()) => {
                        let snapshot = Arc::new(guard.snapshot.clone());
                        drop(guard);
                        if watch_tx.send(snapshot).is_err() {
                            warn!("mode override expiry broadcast had no listeners");
                        }
                    }
                    Err(err) => warn!("mode override expiry recompute failed: {err}"),
                }
            });
        }

        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Arc<ModeSnapshot>> {
        self.watch_tx.subscribe()
    }

    async fn guard(&self) -> PolicyGuard {
        let snapshot = self.snapshot().await;
        PolicyGuard { snapshot }
    }
}

#[derive(Clone, Debug)]
pub struct PolicyGuard {
    snapshot: Arc<ModeSnapshot>,
}

impl PolicyGuard {
    pub fn revision(&self) -> u64 {
        self.snapshot.rev
    }

    pub fn snapshot(&self) -> Arc<ModeSnapshot> {
        Arc::clone(&self.snapshot)
    }
}

/// Map `mode`, `skipActionsRetry`, `SKIP_ACTIONS_RETRY`... onto the
/// canonical snake_case path.
pub(crate) fn canonical_path(path: &str) -> Option<&'static str> {
    let squashed: String = path
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect();
    match squashed.as_str() {
        "mode" => Some(PATH_MODE),
        "actionsallowlist" => Some(PATH_ALLOWLIST),
        "skipactionsretry" => Some(PATH_SKIP_RETRY),
        "skipactionsnavwait" => Some(PATH_SKIP_NAV_WAIT),
        _ => None,
    }
}

pub(crate) fn apply_override_to_snapshot(
    snapshot: &mut ModeSnapshot,
    path: &str,
    value: &Value,
    source: PolicySource,
) -> Result<(), PolicyError> {
    let path = canonical_path(path).ok_or_else(|| PolicyError::UnsupportedPath(path.to_string()))?;
    let config = &mut snapshot.config;
    let changed = match path {
        PATH_MODE => {
            let mode = to_mode(value)?;
            let changed = config.mode != mode;
            config.mode = mode;
            changed
        }
        PATH_ALLOWLIST => {
            let allowlist = to_allowlist(value)?;
            let changed = config.actions_allowlist != allowlist;
            config.actions_allowlist = allowlist;
            changed
        }
        PATH_SKIP_RETRY => merge_bool(&mut config.skip_actions_retry, to_bool(value)?),
        PATH_SKIP_NAV_WAIT => merge_bool(&mut config.skip_actions_nav_wait, to_bool(value)?),
        other => return Err(PolicyError::UnsupportedPath(other.to_string())),
    };
    if changed || source == PolicySource::Builtin {
        snapshot.set_provenance(path, source);
    }
    Ok(())
}

fn merge_bool(target: &mut bool, candidate: bool) -> bool {
    let original = *target;
    *target = candidate;
    *target != original
}

fn to_mode(value: &Value) -> Result<ExecutionMode, PolicyError> {
    value
        .as_str()
        .ok_or_else(|| PolicyError::InvalidValue(format!("expected mode string, got {value}")))?
        .parse()
}

fn to_bool(value: &Value) -> Result<bool, PolicyError> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::String(raw) => raw
            .trim()
            .parse::<bool>()
            .map_err(|_| PolicyError::InvalidValue(format!("expected bool, got {value}"))),
        _ => Err(PolicyError::InvalidValue(format!("expected bool, got {value}"))),
    }
}

/// Accepts a list of type names, a comma separated string, or null to fall
/// back to the builtin allowlist.
fn to_allowlist(value: &Value) -> Result<Option<BTreeSet<NodeType>>, PolicyError> {
    match value {
        Value::Null => Ok(None),
        Value::String(raw) => Ok(Some(
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(NodeType::from)
                .collect(),
        )),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(NodeType::from).ok_or_else(|| {
                    PolicyError::InvalidValue(format!("expected type name, got {item}"))
                })
            })
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Some),
        other => Err(PolicyError::InvalidValue(format!(
            "expected allowlist, got {other}"
        ))),
    }
}
