use std::collections::{BTreeSet, HashMap};

use soulflow_core_types::NodeType;

use crate::model::{ExecutionMode, ExecutionModeConfig, ModeSnapshot};

/// Low-risk types that may run through the registry in hybrid mode.
/// Click, navigate, dblclick and tab management stay on the legacy path
/// until promoted explicitly.
pub fn minimal_hybrid_allowlist() -> BTreeSet<NodeType> {
    [
        NodeType::Fill,
        NodeType::Key,
        NodeType::Scroll,
        NodeType::Drag,
        NodeType::Wait,
        NodeType::Delay,
        NodeType::Screenshot,
        NodeType::Assert,
    ]
    .into_iter()
    .collect()
}

/// Legacy dispatch; retry and nav-wait stay with the runner.
pub fn default_mode_config() -> ExecutionModeConfig {
    ExecutionModeConfig {
        mode: ExecutionMode::Legacy,
        actions_allowlist: None,
        skip_actions_retry: true,
        skip_actions_nav_wait: true,
    }
}

pub fn default_snapshot() -> ModeSnapshot {
    ModeSnapshot {
        rev: 1,
        config: default_mode_config(),
        provenance: HashMap::new(),
    }
}
