use uuid::Uuid;

pub type NodeId = String;
pub type EdgeId = String;
pub type FlowId = String;

/// Generate a fresh node id (`n_<uuid>`).
pub fn new_node_id() -> NodeId {
    format!("n_{}", Uuid::new_v4().simple())
}

pub fn new_edge_id() -> EdgeId {
    format!("e_{}", Uuid::new_v4().simple())
}

pub fn new_flow_id() -> FlowId {
    format!("flow_{}", Uuid::new_v4().simple())
}
