//! Flow data model: nodes, edges, flows and the legacy linear step form.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{new_edge_id, EdgeId, FlowId, NodeId};
use crate::retry::RetryPolicy;

/// Type-specific node configuration. The shape is decided by the node type.
pub type NodeConfig = serde_json::Map<String, Value>;

/// Action kinds a node (or step) can carry.
///
/// The set is closed for the kinds the engine knows how to validate and
/// summarize; anything else is kept verbatim in [`NodeType::Unknown`] so it
/// survives conversion untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    Click,
    Dblclick,
    Fill,
    Key,
    Scroll,
    Drag,
    Wait,
    Delay,
    Assert,
    Navigate,
    Http,
    Extract,
    Script,
    Screenshot,
    OpenTab,
    SwitchTab,
    CloseTab,
    Unknown(String),
}

impl NodeType {
    /// Every known kind, in palette order.
    pub const KNOWN: &'static [NodeType] = &[
        NodeType::Click,
        NodeType::Dblclick,
        NodeType::Fill,
        NodeType::Key,
        NodeType::Scroll,
        NodeType::Drag,
        NodeType::Wait,
        NodeType::Delay,
        NodeType::Assert,
        NodeType::Navigate,
        NodeType::Http,
        NodeType::Extract,
        NodeType::Script,
        NodeType::Screenshot,
        NodeType::OpenTab,
        NodeType::SwitchTab,
        NodeType::CloseTab,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            NodeType::Click => "click",
            NodeType::Dblclick => "dblclick",
            NodeType::Fill => "fill",
            NodeType::Key => "key",
            NodeType::Scroll => "scroll",
            NodeType::Drag => "drag",
            NodeType::Wait => "wait",
            NodeType::Delay => "delay",
            NodeType::Assert => "assert",
            NodeType::Navigate => "navigate",
            NodeType::Http => "http",
            NodeType::Extract => "extract",
            NodeType::Script => "script",
            NodeType::Screenshot => "screenshot",
            NodeType::OpenTab => "openTab",
            NodeType::SwitchTab => "switchTab",
            NodeType::CloseTab => "closeTab",
            NodeType::Unknown(raw) => raw.as_str(),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, NodeType::Unknown(_))
    }
}

impl From<&str> for NodeType {
    fn from(raw: &str) -> Self {
        NodeType::KNOWN
            .iter()
            .find(|kind| kind.as_str() == raw)
            .cloned()
            .unwrap_or_else(|| NodeType::Unknown(raw.to_string()))
    }
}

impl From<String> for NodeType {
    fn from(raw: String) -> Self {
        NodeType::from(raw.as_str())
    }
}

impl From<NodeType> for String {
    fn from(kind: NodeType) -> Self {
        match kind {
            NodeType::Unknown(raw) => raw,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canvas coordinates. Display only; never affects execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One automation action inside the graph form of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub config: NodeConfig,
    #[serde(default)]
    pub ui_position: Position,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: NodeType) -> Self {
        Self {
            id: id.into(),
            kind,
            name: None,
            disabled: false,
            config: NodeConfig::new(),
            ui_position: Position::default(),
        }
    }

    pub fn with_config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.ui_position = position;
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// Branch label carried by an edge. Only `Default` takes part in scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeLabel {
    Default,
    True,
    False,
    OnError,
}

/// Directed control-flow link between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<EdgeLabel>,
}

impl Edge {
    pub fn new(
        id: impl Into<EdgeId>,
        from: impl Into<NodeId>,
        to: impl Into<NodeId>,
        label: Option<EdgeLabel>,
    ) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            label,
        }
    }

    /// A `default`-labeled edge with a generated id.
    pub fn default_between(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self::new(new_edge_id(), from, to, Some(EdgeLabel::Default))
    }

    /// Unset labels count as `default`.
    pub fn is_default(&self) -> bool {
        matches!(self.label, None | Some(EdgeLabel::Default))
    }
}

/// Flattened node used by the legacy interpreter and for persistence.
///
/// `id` may be empty on import; the transform layer assigns one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeType,
    #[serde(flatten)]
    pub fields: NodeConfig,
}

impl Step {
    pub fn new(id: impl Into<String>, kind: NodeType) -> Self {
        Self {
            id: id.into(),
            kind,
            fields: NodeConfig::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn is_disabled(&self) -> bool {
        self.fields
            .get("disabled")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Declared retry policy, if any and well-formed.
    pub fn retry(&self) -> Option<RetryPolicy> {
        self.fields
            .get("retry")
            .and_then(|raw| serde_json::from_value(raw.clone()).ok())
    }

    pub fn timeout_ms(&self) -> Option<u64> {
        self.fields.get("timeoutMs").and_then(Value::as_u64)
    }
}

/// Named variable declaration seeded into a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    #[serde(alias = "key")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Editable flow metadata captured in history snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_version() -> u32 {
    1
}

/// A named, versioned automation definition.
///
/// When `nodes` is non-empty the graph form is authoritative; otherwise the
/// linear `steps` list is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    pub id: FlowId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub variables: Vec<VariableDecl>,
}

impl Flow {
    pub fn new(id: impl Into<FlowId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            version: default_version(),
            steps: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            variables: Vec::new(),
        }
    }

    pub fn with_steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_graph(mut self, nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        self.nodes = nodes;
        self.edges = edges;
        self
    }

    pub fn is_graph_authoritative(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn meta(&self) -> FlowMeta {
        FlowMeta {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}

/// Immutable copy of the editable state, pushed onto the undo/redo stacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub flow_meta: FlowMeta,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}
