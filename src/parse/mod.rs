//! Parse phase: JSON → Rust types + graph construction.

pub mod graph;
pub mod types;

pub use graph::{
    DanglingEdge, NodeRef, ResolveError, WorkflowGraph, build_adjacency, detect_cycle,
    find_orphans, resolve_index, resolve_node,
};
pub use types::*;

use crate::error::RequestError;

/// Deserialize a workflow JSON string into a `Workflow` struct.
pub fn parse(json: &str) -> Result<Workflow, RequestError> {
    serde_json::from_str::<Workflow>(json).map_err(|e| RequestError::json("workflow", e))
}

/// Parse JSON and build the graph in one step.
pub fn parse_and_build(json: &str) -> Result<(Workflow, WorkflowGraph), RequestError> {
    let workflow = parse(json)?;
    let graph = WorkflowGraph::build(&workflow);
    Ok((workflow, graph))
}
