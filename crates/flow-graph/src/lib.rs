//! Graph layer of the flow engine.
//!
//! Converts between the linear step list and the node/edge graph, orders
//! graph nodes for execution and produces validation diagnostics. Nothing in
//! here performs I/O; every function is a pure transformation over plain data.

pub mod catalog;
pub mod paths;
pub mod scheduler;
pub mod transform;
pub mod validation;

pub use catalog::{spec_for, NodeSpec};
pub use paths::is_valid_var_path;
pub use scheduler::{nodes_to_steps, schedule, steps_for_flow, topo_order, CycleDiagnostic, Schedule};
pub use transform::{
    auto_chain_edges, default_config_for, graph_from_flow, layout_position, map_config_to_step,
    map_step_to_config, steps_to_nodes, summarize_node,
};
pub use validation::{validate_flow, validate_graph, validate_node, FlowValidation, GraphIssue};
