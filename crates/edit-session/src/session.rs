use serde_json::Value;
use soulflow_core_types::{
    new_flow_id, new_node_id, Edge, EdgeId, Flow, FlowId, FlowMeta, Node, NodeConfig, NodeId,
    NodeType, Position, Snapshot, Step, VariableDecl,
};
use soulflow_flow_graph::{
    auto_chain_edges, default_config_for, graph_from_flow, layout_position, nodes_to_steps,
    steps_to_nodes, topo_order, validate_flow, validate_graph, FlowValidation, GraphIssue,
};
use tracing::debug;

use crate::errors::SessionError;
use crate::history::History;

const DUPLICATE_OFFSET: f64 = 40.0;

/// Live editing state of one flow.
#[derive(Debug, Clone)]
pub struct EditSession {
    flow_id: FlowId,
    version: u32,
    variables: Vec<VariableDecl>,
    meta: FlowMeta,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    active_node: Option<NodeId>,
    history: History,
}

impl Default for EditSession {
    fn default() -> Self {
        Self::from_flow(&Flow::new(new_flow_id(), "Untitled flow"))
    }
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_flow(flow: &Flow) -> Self {
        let mut session = Self {
            flow_id: flow.id.clone(),
            version: flow.version,
            variables: Vec::new(),
            meta: FlowMeta::default(),
            nodes: Vec::new(),
            edges: Vec::new(),
            active_node: None,
            history: History::default(),
        };
        session.init_from_flow(flow);
        session
    }

    /// Loads `flow` as the new undo floor. Linear flows are converted and
    /// chained; graphs without edges get a linear chain.
    pub fn init_from_flow(&mut self, flow: &Flow) {
        let (nodes, edges) = graph_from_flow(flow);
        self.flow_id = flow.id.clone();
        self.version = flow.version;
        self.variables = flow.variables.clone();
        self.meta = flow.meta();
        self.nodes = nodes;
        self.edges = edges;
        self.active_node = None;
        self.history.reset(self.snapshot());
        debug!(flow = %self.flow_id, nodes = self.nodes.len(), "edit session initialized");
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn meta(&self) -> &FlowMeta {
        &self.meta
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn active_node(&self) -> Option<&NodeId> {
        self.active_node.as_ref()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Deep copy of the editable state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            flow_meta: self.meta.clone(),
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.meta = snapshot.flow_meta;
        self.nodes = snapshot.nodes;
        self.edges = snapshot.edges;
        if self
            .active_node
            .as_deref()
            .is_some_and(|active| !self.contains(active))
        {
            self.active_node = None;
        }
    }

    /// Runs `mutate` and records the pre-mutation state. Callers check
    /// their inputs first so a failed operation records nothing.
    fn recorded<T>(&mut self, mutate: impl FnOnce(&mut Self) -> T) -> T {
        let before = self.snapshot();
        let out = mutate(self);
        self.history.record(before);
        out
    }

    fn contains(&self, id: &str) -> bool {
        self.nodes.iter().any(|node| node.id == id)
    }

    fn position_of(&self, id: &str) -> Result<usize, SessionError> {
        self.nodes
            .iter()
            .position(|node| node.id == id)
            .ok_or_else(|| SessionError::NodeNotFound(id.to_string()))
    }

    pub fn set_active_node(&mut self, id: Option<&str>) -> Result<(), SessionError> {
        if let Some(id) = id {
            self.position_of(id)?;
        }
        self.active_node = id.map(str::to_string);
        Ok(())
    }

    /// Adds a node seeded with the type's default config and connects it
    /// after the active node, or after the last node when none is active.
    /// An existing default successor of that node moves behind the new one.
    pub fn add_node(&mut self, kind: NodeType, position: Option<Position>) -> NodeId {
        let id = new_node_id();
        self.recorded(|session| {
            let anchor = session
                .active_node
                .clone()
                .filter(|active| session.contains(active))
                .or_else(|| session.nodes.last().map(|node| node.id.clone()));
            let position = position.unwrap_or_else(|| layout_position(session.nodes.len()));
            let node = Node::new(id.clone(), kind.clone())
                .with_config(default_config_for(&kind))
                .with_position(position);
            session.nodes.push(node);

            if let Some(anchor) = anchor {
                let displaced = session.take_default_out_edge(&anchor);
                session.edges.push(Edge::default_between(anchor, id.clone()));
                if let Some(next) = displaced {
                    session.edges.push(Edge::default_between(id.clone(), next.to));
                }
            }
            session.active_node = Some(id.clone());
        });
        debug!(node = %id, kind = %kind, "node added");
        id
    }

    /// Copies a node under a fresh id, offset from the original. The copy
    /// is not connected.
    pub fn duplicate_node(&mut self, id: &str) -> Result<NodeId, SessionError> {
        let source = self.nodes[self.position_of(id)?].clone();
        let copy_id = new_node_id();
        self.recorded(|session| {
            let mut copy = source;
            copy.id = copy_id.clone();
            copy.ui_position = Position::new(
                copy.ui_position.x + DUPLICATE_OFFSET,
                copy.ui_position.y + DUPLICATE_OFFSET,
            );
            session.nodes.push(copy);
            session.active_node = Some(copy_id.clone());
        });
        debug!(node = %id, copy = %copy_id, "node duplicated");
        Ok(copy_id)
    }

    /// Removes a node and every edge touching it.
    pub fn remove_node(&mut self, id: &str) -> Result<(), SessionError> {
        let index = self.position_of(id)?;
        self.recorded(|session| {
            session.nodes.remove(index);
            session.edges.retain(|edge| edge.from != id && edge.to != id);
            if session.active_node.as_deref() == Some(id) {
                session.active_node = None;
            }
        });
        debug!(node = %id, "node removed");
        Ok(())
    }

    /// Adds a default edge, replacing any default out-edge of `from`.
    pub fn connect(&mut self, from: &str, to: &str) -> Result<EdgeId, SessionError> {
        self.position_of(from)?;
        self.position_of(to)?;
        if from == to {
            return Err(SessionError::SelfLoop(from.to_string()));
        }
        let edge = Edge::default_between(from, to);
        let edge_id = edge.id.clone();
        self.recorded(|session| {
            session.take_default_out_edge(from);
            session.edges.push(edge);
        });
        debug!(from, to, edge = %edge_id, "nodes connected");
        Ok(edge_id)
    }

    pub fn remove_edge(&mut self, edge_id: &str) -> Result<(), SessionError> {
        let index = self
            .edges
            .iter()
            .position(|edge| edge.id == edge_id)
            .ok_or_else(|| SessionError::EdgeNotFound(edge_id.to_string()))?;
        self.recorded(|session| {
            session.edges.remove(index);
        });
        Ok(())
    }

    /// Replaces the graph with converted steps chained in order.
    pub fn import_from_steps(&mut self, steps: &[Step]) {
        let nodes = steps_to_nodes(steps);
        let edges = auto_chain_edges(&nodes);
        self.recorded(|session| {
            session.nodes = nodes;
            session.edges = edges;
            session.active_node = None;
        });
        debug!(steps = steps.len(), "steps imported");
    }

    /// Lays nodes out vertically in execution order.
    pub fn auto_layout(&mut self) {
        let order: Vec<NodeId> = topo_order(&self.nodes, &self.edges)
            .into_iter()
            .map(|node| node.id)
            .collect();
        self.recorded(|session| {
            for (index, id) in order.iter().enumerate() {
                if let Some(node) = session.nodes.iter_mut().find(|node| &node.id == id) {
                    node.ui_position = layout_position(index);
                }
            }
        });
    }

    /// Shallow-merges `patch` into the node's config. `null` removes a key.
    pub fn update_node_config(&mut self, id: &str, patch: NodeConfig) -> Result<(), SessionError> {
        let index = self.position_of(id)?;
        self.recorded(|session| {
            let config = &mut session.nodes[index].config;
            for (key, value) in patch {
                if value == Value::Null {
                    config.remove(&key);
                } else {
                    config.insert(key, value);
                }
            }
        });
        Ok(())
    }

    pub fn rename_node(&mut self, id: &str, name: Option<String>) -> Result<(), SessionError> {
        let index = self.position_of(id)?;
        self.recorded(|session| {
            session.nodes[index].name = name.filter(|name| !name.trim().is_empty());
        });
        Ok(())
    }

    pub fn set_node_disabled(&mut self, id: &str, disabled: bool) -> Result<(), SessionError> {
        let index = self.position_of(id)?;
        self.recorded(|session| session.nodes[index].disabled = disabled);
        Ok(())
    }

    pub fn set_meta(&mut self, meta: FlowMeta) {
        self.recorded(|session| session.meta = meta);
    }

    /// Drag-to-reposition. Not recorded in history.
    pub fn update_node_position(&mut self, id: &str, position: Position) -> Result<(), SessionError> {
        let index = self.position_of(id)?;
        self.nodes[index].ui_position = position;
        Ok(())
    }

    /// Restores the previous state. Returns false when there is nothing to
    /// undo.
    pub fn undo(&mut self) -> bool {
        match self.history.undo(self.snapshot()) {
            Some(previous) => {
                self.restore(previous);
                debug!(past = self.history.past_len(), "undo");
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo(self.snapshot()) {
            Some(next) => {
                self.restore(next);
                debug!(future = self.history.future_len(), "redo");
                true
            }
            None => false,
        }
    }

    /// Per-node diagnostics for inline display.
    pub fn validate(&self) -> FlowValidation {
        validate_flow(&self.nodes)
    }

    pub fn graph_issues(&self) -> Vec<GraphIssue> {
        validate_graph(&self.nodes, &self.edges)
    }

    /// Flow carrying both the graph and its scheduled step list.
    pub fn export_flow(&self) -> Flow {
        let mut flow = Flow::new(self.flow_id.clone(), self.meta.name.clone())
            .with_steps(nodes_to_steps(&self.nodes, &self.edges))
            .with_graph(self.nodes.clone(), self.edges.clone());
        flow.description = self.meta.description.clone();
        flow.version = self.version;
        flow.variables = self.variables.clone();
        flow
    }

    fn take_default_out_edge(&mut self, from: &str) -> Option<Edge> {
        let index = self
            .edges
            .iter()
            .position(|edge| edge.from == from && edge.is_default())?;
        let removed = self.edges.remove(index);
        // any further default out-edges violate the single-successor rule
        self.edges.retain(|edge| !(edge.from == from && edge.is_default()));
        Some(removed)
    }
}
