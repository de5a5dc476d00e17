use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::api::apply_override_to_snapshot;
use crate::defaults::default_snapshot;
use crate::errors::PolicyError;
use crate::model::{ModeSnapshot, PolicySource};

const ENV_PREFIX: &str = "SOUL_FLOW__";
const ENV_JSON: &str = "SOUL_FLOW_OVERRIDE_JSON";
const ENV_CLI_OVERRIDES: &str = "SOUL_FLOW_CLI_OVERRIDES";

#[derive(Debug, Default)]
pub struct LoadOptions {
    pub paths: Vec<PathBuf>,
    pub include_env: bool,
    pub include_cli_env: bool,
}

pub fn load_snapshot(path: Option<&Path>) -> Result<ModeSnapshot, PolicyError> {
    let mut options = LoadOptions {
        include_env: true,
        include_cli_env: true,
        ..LoadOptions::default()
    };
    if let Some(p) = path {
        options.paths.push(p.to_path_buf());
    }
    load_snapshot_with_options(&options)
}

pub fn load_snapshot_with_options(options: &LoadOptions) -> Result<ModeSnapshot, PolicyError> {
    let mut snapshot = default_snapshot();
    bootstrap_builtin_provenance(&mut snapshot)?;

    for path in &options.paths {
        if path.exists() {
            debug!(path = %path.display(), "applying execution mode file");
            apply_overlays(&mut snapshot, overlays_from_file(path)?)?;
        }
    }

    if options.include_env {
        apply_overlays(&mut snapshot, overlays_from_env()?)?;
    }

    if options.include_cli_env {
        apply_overlays(&mut snapshot, overlays_from_cli_env())?;
    }

    Ok(snapshot)
}

struct PolicyOverlay {
    path: String,
    value: Value,
    source: PolicySource,
}

fn apply_overlays(
    snapshot: &mut ModeSnapshot,
    overlays: Vec<PolicyOverlay>,
) -> Result<(), PolicyError> {
    for overlay in overlays {
        apply_override_to_snapshot(snapshot, &overlay.path, &overlay.value, overlay.source)?;
    }
    Ok(())
}

fn overlays_from_file(path: &Path) -> Result<Vec<PolicyOverlay>, PolicyError> {
    let content = fs::read_to_string(path).map_err(|source| PolicyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let yaml_value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|err| PolicyError::Invalid(err.to_string()))?;
    let json_value =
        serde_json::to_value(yaml_value).map_err(|err| PolicyError::Invalid(err.to_string()))?;
    Ok(flatten_value(json_value, PolicySource::File))
}

fn overlays_from_env() -> Result<Vec<PolicyOverlay>, PolicyError> {
    let mut overlays = Vec::new();
    for (key, raw) in env::vars() {
        let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let path = stripped.trim_matches('_').to_ascii_lowercase();
        if path.is_empty() {
            continue;
        }
        overlays.push(PolicyOverlay {
            path,
            value: parse_env_value(&raw),
            source: PolicySource::Env,
        });
    }

    if let Ok(raw_json) = env::var(ENV_JSON) {
        if !raw_json.trim().is_empty() {
            let json_value: Value = serde_json::from_str(&raw_json)
                .map_err(|err| PolicyError::Invalid(err.to_string()))?;
            overlays.extend(flatten_value(json_value, PolicySource::Env));
        }
    }

    Ok(overlays)
}

fn overlays_from_cli_env() -> Vec<PolicyOverlay> {
    let Ok(raw) = env::var(ENV_CLI_OVERRIDES) else {
        return Vec::new();
    };
    raw.split(',')
        .filter_map(|token| {
            let (path, value_raw) = token.trim().split_once('=').unwrap_or((token.trim(), ""));
            let path = path.trim();
            (!path.is_empty()).then(|| PolicyOverlay {
                path: path.to_string(),
                value: parse_env_value(value_raw.trim()),
                source: PolicySource::Cli,
            })
        })
        .collect()
}

fn parse_env_value(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
        return parsed;
    }
    if let Ok(boolean) = raw.parse::<bool>() {
        return Value::Bool(boolean);
    }
    Value::String(raw.to_string())
}

/// The config is flat, so a top-level object maps one key to one overlay.
/// Arrays (the allowlist) stay whole.
fn flatten_value(value: Value, source: PolicySource) -> Vec<PolicyOverlay> {
    match value {
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| PolicyOverlay {
                path: key.trim().to_string(),
                value,
                source,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn bootstrap_builtin_provenance(snapshot: &mut ModeSnapshot) -> Result<(), PolicyError> {
    let builtin = serde_json::to_value(&snapshot.config)
        .map_err(|err| PolicyError::Invalid(err.to_string()))?;
    for overlay in flatten_value(builtin, PolicySource::Builtin) {
        apply_override_to_snapshot(snapshot, &overlay.path, &overlay.value, overlay.source)?;
    }
    Ok(())
}
