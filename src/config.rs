//! Application configuration

use std::path::PathBuf;

use action_flow::FailureStrategy;
use serde::{Deserialize, Serialize};

/// Settings read from `soulflow.yaml`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Execution mode policy files, applied in order
    pub policy_paths: Vec<PathBuf>,

    /// Failure strategy for `run` unless overridden on the command line
    pub failure_strategy: FailureStrategy,

    /// Whole-run deadline for `run`
    pub run_timeout_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: Config = serde_yaml::from_str("failure_strategy: continue\n").unwrap();
        assert_eq!(config.failure_strategy, FailureStrategy::Continue);
        assert!(config.policy_paths.is_empty());
        assert_eq!(config.run_timeout_ms, None);
    }
}
