//! Type-indexed table of node capabilities.
//!
//! Each known [`NodeType`] maps to a [`NodeSpec`] that knows the canonical
//! empty configuration, the fields that matter for step conversion, the
//! structural checks and the one-line summary shown in node lists. Unknown
//! types resolve to a passthrough spec that accepts anything.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde_json::{json, Value};
use soulflow_core_types::{NodeConfig, NodeType};

use crate::paths::is_valid_var_path;

/// Capability set of one node type.
pub trait NodeSpec: Send + Sync {
    /// Fields the step form must carry through a round trip.
    fn significant_fields(&self) -> &'static [&'static str];

    /// Seed configuration for a freshly created node.
    fn default_config(&self) -> NodeConfig;

    /// Structural problems with `config`, one message per problem.
    fn validate(&self, config: &NodeConfig) -> Vec<String>;

    /// Short label for node lists. Never fails on malformed config.
    fn summarize(&self, config: &NodeConfig) -> String;
}

/// Fields every step type may carry regardless of kind.
const COMMON_FIELDS: &[&str] = &["retry", "timeoutMs", "screenshotOnFail"];

struct KindSpec {
    kind: NodeType,
    fields: &'static [&'static str],
    defaults: fn() -> Value,
    validate: fn(&NodeConfig) -> Vec<String>,
    summarize: fn(&NodeConfig) -> String,
}

impl NodeSpec for KindSpec {
    fn significant_fields(&self) -> &'static [&'static str] {
        self.fields
    }

    fn default_config(&self) -> NodeConfig {
        match (self.defaults)() {
            Value::Object(map) => map,
            _ => NodeConfig::new(),
        }
    }

    fn validate(&self, config: &NodeConfig) -> Vec<String> {
        (self.validate)(config)
    }

    fn summarize(&self, config: &NodeConfig) -> String {
        (self.summarize)(config)
    }
}

struct Passthrough;

impl NodeSpec for Passthrough {
    fn significant_fields(&self) -> &'static [&'static str] {
        COMMON_FIELDS
    }

    fn default_config(&self) -> NodeConfig {
        NodeConfig::new()
    }

    fn validate(&self, _config: &NodeConfig) -> Vec<String> {
        Vec::new()
    }

    fn summarize(&self, _config: &NodeConfig) -> String {
        String::new()
    }
}

static PASSTHROUGH: Passthrough = Passthrough;

static CATALOG: Lazy<HashMap<NodeType, KindSpec>> = Lazy::new(|| {
    builtin_specs()
        .into_iter()
        .map(|spec| (spec.kind.clone(), spec))
        .collect()
});

/// Look up the capability value for `kind`.
pub fn spec_for(kind: &NodeType) -> &'static dyn NodeSpec {
    match CATALOG.get(kind) {
        Some(spec) => spec as &dyn NodeSpec,
        None => &PASSTHROUGH,
    }
}

fn no_checks(_config: &NodeConfig) -> Vec<String> {
    Vec::new()
}

fn builtin_specs() -> Vec<KindSpec> {
    vec![
        KindSpec {
            kind: NodeType::Click,
            fields: &["target", "before", "after"],
            defaults: || {
                json!({
                    "target": { "candidates": [] },
                    "before": { "scrollIntoView": true, "waitForSelector": true },
                    "after": { "waitForNavigation": false, "waitForNetworkIdle": false }
                })
            },
            validate: check_target,
            summarize: |config| target_label(config, "target"),
        },
        KindSpec {
            kind: NodeType::Dblclick,
            fields: &["target", "before", "after"],
            defaults: || {
                json!({
                    "target": { "candidates": [] },
                    "before": { "scrollIntoView": true, "waitForSelector": true },
                    "after": { "waitForNavigation": false, "waitForNetworkIdle": false }
                })
            },
            validate: check_target,
            summarize: |config| target_label(config, "target"),
        },
        KindSpec {
            kind: NodeType::Fill,
            fields: &["target", "value"],
            defaults: || json!({ "target": { "candidates": [] }, "value": "" }),
            validate: |config| {
                let mut errors = check_target(config);
                if matches!(config.get("value"), None | Some(Value::Null)) {
                    errors.push("missing fill value".to_string());
                }
                errors
            },
            summarize: |config| {
                let target = target_label(config, "target");
                let value = text(config, "value");
                if value.is_empty() {
                    target
                } else {
                    format!("{target} = {value}")
                }
            },
        },
        KindSpec {
            kind: NodeType::Key,
            fields: &["keys", "target"],
            defaults: || json!({ "keys": "" }),
            validate: no_checks,
            summarize: |config| text(config, "keys"),
        },
        KindSpec {
            kind: NodeType::Scroll,
            fields: &["mode", "target", "offset"],
            defaults: || json!({ "mode": "offset", "offset": { "x": 0, "y": 300 } }),
            validate: no_checks,
            summarize: |config| text(config, "mode"),
        },
        KindSpec {
            kind: NodeType::Drag,
            fields: &["start", "end", "path"],
            defaults: || json!({ "start": { "candidates": [] }, "end": { "candidates": [] } }),
            validate: no_checks,
            summarize: |config| {
                format!(
                    "{} -> {}",
                    target_label(config, "start"),
                    target_label(config, "end")
                )
            },
        },
        KindSpec {
            kind: NodeType::Wait,
            fields: &["condition"],
            defaults: || json!({ "condition": { "text": "", "appear": true } }),
            validate: |config| {
                if config.get("condition").map_or(false, Value::is_object) {
                    Vec::new()
                } else {
                    vec!["missing wait condition".to_string()]
                }
            },
            summarize: summarize_wait,
        },
        KindSpec {
            kind: NodeType::Delay,
            fields: &["ms"],
            defaults: || json!({ "ms": 1000 }),
            validate: no_checks,
            summarize: |config| match config.get("ms").and_then(Value::as_u64) {
                Some(ms) => format!("{ms}ms"),
                None => String::new(),
            },
        },
        KindSpec {
            kind: NodeType::Assert,
            fields: &["assert", "failStrategy"],
            defaults: || json!({ "assert": { "exists": "" }, "failStrategy": "stop" }),
            validate: |config| {
                if config.get("assert").map_or(false, Value::is_object) {
                    Vec::new()
                } else {
                    vec!["missing assert condition".to_string()]
                }
            },
            summarize: |config| match config.get("assert").and_then(Value::as_object) {
                Some(assert) => assert
                    .iter()
                    .next()
                    .map(|(key, value)| format!("{key}: {}", scalar(value)))
                    .unwrap_or_default(),
                None => String::new(),
            },
        },
        KindSpec {
            kind: NodeType::Navigate,
            fields: &["url"],
            defaults: || json!({ "url": "" }),
            validate: |config| {
                if is_blank(config, "url") {
                    vec!["missing url".to_string()]
                } else {
                    Vec::new()
                }
            },
            summarize: |config| text(config, "url"),
        },
        KindSpec {
            kind: NodeType::Http,
            fields: &["method", "url", "headers", "body", "saveAs", "assign"],
            defaults: || json!({ "method": "GET", "url": "", "headers": {}, "body": "" }),
            validate: |config| {
                let mut errors = Vec::new();
                if is_blank(config, "url") {
                    errors.push("missing url".to_string());
                }
                errors.extend(check_assign(config));
                errors
            },
            summarize: |config| {
                let method = text(config, "method");
                let method = if method.is_empty() { "GET".to_string() } else { method };
                format!("{} {}", method.to_uppercase(), text(config, "url"))
                    .trim_end()
                    .to_string()
            },
        },
        KindSpec {
            kind: NodeType::Extract,
            fields: &["selector", "attr", "js", "saveAs"],
            defaults: || json!({ "selector": "", "attr": "text", "js": "", "saveAs": "" }),
            validate: |config| {
                let mut errors = Vec::new();
                if is_blank(config, "saveAs") {
                    errors.push("missing saveAs".to_string());
                }
                if is_blank(config, "selector") && is_blank(config, "js") {
                    errors.push("selector or js is required".to_string());
                }
                errors
            },
            summarize: |config| text(config, "saveAs"),
        },
        KindSpec {
            kind: NodeType::Script,
            fields: &["world", "code", "when", "saveAs", "assign"],
            defaults: || json!({ "world": "ISOLATED", "code": "", "when": "before" }),
            validate: |config| {
                let mut errors = Vec::new();
                let has_assign = config
                    .get("assign")
                    .and_then(Value::as_object)
                    .map_or(false, |assign| !assign.is_empty());
                let wants_output = !is_blank(config, "saveAs") || has_assign;
                if wants_output && is_blank(config, "code") {
                    errors.push("code is required when saveAs or assign is set".to_string());
                }
                errors.extend(check_assign(config));
                errors
            },
            summarize: |config| {
                let code = text(config, "code");
                let first = code.lines().next().unwrap_or("").trim();
                first.chars().take(40).collect()
            },
        },
        KindSpec {
            kind: NodeType::Screenshot,
            fields: &["selector", "fullPage", "saveAs"],
            defaults: || json!({ "selector": "", "fullPage": false, "saveAs": "" }),
            validate: no_checks,
            summarize: |config| {
                if config.get("fullPage").and_then(Value::as_bool).unwrap_or(false) {
                    "full page".to_string()
                } else {
                    text(config, "selector")
                }
            },
        },
        KindSpec {
            kind: NodeType::OpenTab,
            fields: &["url", "newWindow"],
            defaults: || json!({ "url": "", "newWindow": false }),
            validate: no_checks,
            summarize: |config| text(config, "url"),
        },
        KindSpec {
            kind: NodeType::SwitchTab,
            fields: &["tabId", "urlContains", "titleContains"],
            defaults: || json!({ "urlContains": "", "titleContains": "" }),
            validate: |config| {
                let has_tab_id = match config.get("tabId") {
                    Some(Value::Number(_)) => true,
                    Some(Value::String(raw)) => !raw.trim().is_empty(),
                    _ => false,
                };
                if has_tab_id || !is_blank(config, "urlContains") || !is_blank(config, "titleContains")
                {
                    Vec::new()
                } else {
                    vec!["one of tabId, urlContains or titleContains is required".to_string()]
                }
            },
            summarize: |config| {
                ["urlContains", "titleContains", "tabId"]
                    .iter()
                    .map(|key| text(config, key))
                    .find(|value| !value.is_empty())
                    .unwrap_or_default()
            },
        },
        KindSpec {
            kind: NodeType::CloseTab,
            fields: &["tabIds", "url"],
            defaults: || json!({}),
            validate: no_checks,
            summarize: |config| text(config, "url"),
        },
    ]
}

fn text(config: &NodeConfig, key: &str) -> String {
    config.get(key).map(scalar).unwrap_or_default()
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(raw) => raw.clone(),
        Value::Number(num) => num.to_string(),
        Value::Bool(flag) => flag.to_string(),
        _ => String::new(),
    }
}

fn is_blank(config: &NodeConfig, key: &str) -> bool {
    config
        .get(key)
        .and_then(Value::as_str)
        .map_or(true, |raw| raw.trim().is_empty())
}

fn candidates(config: &NodeConfig, key: &str) -> Vec<String> {
    config
        .get(key)
        .and_then(|target| target.get("candidates"))
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|candidate| candidate.get("value").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn target_label(config: &NodeConfig, key: &str) -> String {
    if let Some(first) = candidates(config, key).into_iter().next() {
        return first;
    }
    config
        .get(key)
        .and_then(|target| target.get("selector"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

fn check_target(config: &NodeConfig) -> Vec<String> {
    let has_candidate = config
        .get("target")
        .and_then(|target| target.get("candidates"))
        .and_then(Value::as_array)
        .map_or(false, |list| !list.is_empty());
    if has_candidate {
        Vec::new()
    } else {
        vec!["missing target selector".to_string()]
    }
}

fn check_assign(config: &NodeConfig) -> Vec<String> {
    let Some(assign) = config.get("assign").and_then(Value::as_object) else {
        return Vec::new();
    };
    assign
        .iter()
        .filter_map(|(key, path)| match path.as_str() {
            Some(raw) if is_valid_var_path(raw) => None,
            Some(raw) => Some(format!("invalid assign path for {key}: {raw}")),
            None => Some(format!("invalid assign path for {key}: {path}")),
        })
        .collect()
}

fn summarize_wait(config: &NodeConfig) -> String {
    let Some(condition) = config.get("condition").and_then(Value::as_object) else {
        return String::new();
    };
    let field = |key: &str| condition.get(key).map(scalar).unwrap_or_default();
    if !field("text").is_empty() {
        format!("text: {}", field("text"))
    } else if !field("selector").is_empty() {
        format!("selector: {}", field("selector"))
    } else if condition.get("navigation").and_then(Value::as_bool) == Some(true) {
        "navigation".to_string()
    } else if condition.get("networkIdle").and_then(Value::as_bool) == Some(true) {
        "network idle".to_string()
    } else if !field("sleep").is_empty() {
        format!("{}ms", field("sleep"))
    } else {
        String::new()
    }
}
