use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use soulflow_core_types::NodeType;

use crate::defaults::minimal_hybrid_allowlist;
use crate::errors::PolicyError;

/// Which dispatcher handles the steps of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Everything goes through the monolithic step interpreter.
    #[default]
    Legacy,
    /// Everything goes through the action registry.
    Actions,
    /// Allowlisted types go to the registry, the rest to the interpreter.
    Hybrid,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Legacy => "legacy",
            ExecutionMode::Actions => "actions",
            ExecutionMode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = PolicyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(ExecutionMode::Legacy),
            "actions" => Ok(ExecutionMode::Actions),
            "hybrid" => Ok(ExecutionMode::Hybrid),
            other => Err(PolicyError::InvalidValue(format!(
                "unknown execution mode '{other}'"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionModeConfig {
    pub mode: ExecutionMode,
    /// Types routed to the registry in hybrid mode. `None` means the minimal
    /// builtin allowlist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions_allowlist: Option<BTreeSet<NodeType>>,
    #[serde(default = "enabled")]
    pub skip_actions_retry: bool,
    #[serde(default = "enabled")]
    pub skip_actions_nav_wait: bool,
}

fn enabled() -> bool {
    true
}

impl ExecutionModeConfig {
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_allowlist<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = NodeType>,
    {
        self.actions_allowlist = Some(kinds.into_iter().collect());
        self
    }

    pub fn effective_allowlist(&self) -> BTreeSet<NodeType> {
        self.actions_allowlist
            .clone()
            .unwrap_or_else(minimal_hybrid_allowlist)
    }
}

impl Default for ExecutionModeConfig {
    fn default() -> Self {
        crate::defaults::default_mode_config()
    }
}

/// Versioned config plus where each leaf came from.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModeSnapshot {
    pub rev: u64,
    pub config: ExecutionModeConfig,
    #[serde(default)]
    pub provenance: HashMap<String, PolicyProvenance>,
}

impl ModeSnapshot {
    pub fn set_provenance(&mut self, path: &str, source: PolicySource) {
        self.provenance.insert(
            path.to_string(),
            PolicyProvenance {
                path: path.to_string(),
                source,
            },
        );
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyProvenance {
    pub path: String,
    pub source: PolicySource,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PolicySource {
    Builtin,
    File,
    Env,
    Cli,
    RuntimeOverride,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuntimeOverrideSpec {
    pub path: String,
    pub value: serde_json::Value,
    pub owner: String,
    pub reason: String,
    pub ttl_seconds: u64,
}
