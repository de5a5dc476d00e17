//! Execution-mode policy for flow runs.
//!
//! Decides whether steps go through the legacy interpreter, the action
//! registry, or a hybrid of both, and which per-call overrides the action
//! path gets. Configuration is layered: builtin defaults, YAML files,
//! environment, CLI and finally runtime overrides.

pub mod api;
pub mod defaults;
pub mod errors;
pub mod loader;
pub mod model;

pub use api::{InMemoryPolicyCenter, PolicyCenter, PolicyGuard};
pub use defaults::{default_mode_config, default_snapshot, minimal_hybrid_allowlist};
pub use errors::PolicyError;
pub use loader::{load_snapshot, load_snapshot_with_options, LoadOptions};
pub use model::{
    ExecutionMode, ExecutionModeConfig, ModeSnapshot, PolicyProvenance, PolicySource,
    RuntimeOverrideSpec,
};
