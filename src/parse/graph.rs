//! petgraph-based directed graph wrapper plus the traversal primitives
//! shared by the validator and the diff engine.

use std::collections::{BTreeMap, HashMap};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use super::types::{Endpoint, Node, Workflow};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeLabel {
    pub kind: String,
    pub output_index: usize,
    pub input_index: usize,
}

/// A connection whose source or target does not name an existing node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingEdge {
    pub source: String,
    pub kind: String,
    pub output_index: usize,
    pub target: Endpoint,
    pub missing_source: bool,
    pub missing_target: bool,
}

pub struct WorkflowGraph {
    pub graph: DiGraph<String, EdgeLabel>,
    pub node_indices: HashMap<String, NodeIndex>,
    pub dangling: Vec<DanglingEdge>,
}

impl WorkflowGraph {
    /// Build the graph keyed by node name. Never fails: broken references
    /// are collected in `dangling` for the structural validator.
    pub fn build(workflow: &Workflow) -> Self {
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();
        let mut dangling = Vec::new();

        for node in &workflow.nodes {
            if node_indices.contains_key(&node.name) {
                continue;
            }
            let idx = graph.add_node(node.name.clone());
            node_indices.insert(node.name.clone(), idx);
        }

        for (source, kind, output_index, endpoint) in workflow.edges() {
            let source_idx = node_indices.get(source);
            let target_idx = node_indices.get(&endpoint.node);

            match (source_idx, target_idx) {
                (Some(&s), Some(&t)) => {
                    graph.add_edge(
                        s,
                        t,
                        EdgeLabel {
                            kind: kind.to_string(),
                            output_index,
                            input_index: endpoint.index,
                        },
                    );
                }
                (s, t) => dangling.push(DanglingEdge {
                    source: source.to_string(),
                    kind: kind.to_string(),
                    output_index,
                    target: endpoint.clone(),
                    missing_source: s.is_none(),
                    missing_target: t.is_none(),
                }),
            }
        }

        WorkflowGraph {
            graph,
            node_indices,
            dangling,
        }
    }

    pub fn successors(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Outgoing)
    }

    pub fn predecessors(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Incoming)
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<&str> {
        let Some(&idx) = self.node_indices.get(name) else {
            return vec![];
        };
        self.graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].as_str())
            .collect()
    }

    pub fn incoming_count(&self, name: &str) -> usize {
        self.predecessors(name).len()
    }

    pub fn outgoing_count(&self, name: &str) -> usize {
        self.successors(name).len()
    }

    /// Flatten every port of every connection type into plain successor edges.
    /// Every node is present as a key, even without successors.
    pub fn adjacency(&self) -> BTreeMap<String, Vec<String>> {
        let mut adjacency = BTreeMap::new();
        for idx in self.graph.node_indices() {
            // petgraph yields neighbors newest-first; reverse for insertion order.
            let mut successors: Vec<String> = self
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .map(|n| self.graph[n].clone())
                .collect();
            successors.reverse();
            successors.dedup();
            adjacency.insert(self.graph[idx].clone(), successors);
        }
        adjacency
    }
}

/// Flatten a workflow's connections into name -> successor names.
pub fn build_adjacency(workflow: &Workflow) -> BTreeMap<String, Vec<String>> {
    WorkflowGraph::build(workflow).adjacency()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    InProgress,
    Done,
}

/// Three-color depth-first search. Returns the first cycle found as the
/// ordered list of nodes on it (the last node links back to the first),
/// or `None` for an acyclic graph.
///
/// Iterative so that long chains cannot exhaust the call stack. Successors
/// missing from `adjacency` are treated as leaves.
pub fn detect_cycle(adjacency: &BTreeMap<String, Vec<String>>) -> Option<Vec<String>> {
    let mut color: HashMap<&str, Color> = HashMap::with_capacity(adjacency.len());

    for start in adjacency.keys() {
        if color.contains_key(start.as_str()) {
            continue;
        }

        // (node, index of the next successor to visit)
        let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];
        color.insert(start.as_str(), Color::InProgress);

        while let Some((node, next)) = stack.last_mut() {
            let successors = adjacency.get(*node).map(Vec::as_slice).unwrap_or(&[]);
            if *next >= successors.len() {
                color.insert(*node, Color::Done);
                stack.pop();
                continue;
            }
            let successor = successors[*next].as_str();
            *next += 1;

            match color.get(successor) {
                None => {
                    color.insert(successor, Color::InProgress);
                    stack.push((successor, 0));
                }
                Some(Color::InProgress) => {
                    let start_at = stack
                        .iter()
                        .position(|(n, _)| *n == successor)
                        .unwrap_or(0);
                    return Some(stack[start_at..].iter().map(|(n, _)| n.to_string()).collect());
                }
                Some(Color::Done) => {}
            }
        }
    }

    None
}

/// Enabled nodes with neither incoming nor outgoing connections that are not
/// entry points. A single-node workflow has no orphans.
pub fn find_orphans<'a>(
    workflow: &'a Workflow,
    graph: &WorkflowGraph,
    is_entry_point: impl Fn(&Node) -> bool,
) -> Vec<&'a Node> {
    if workflow.nodes.len() < 2 {
        return vec![];
    }
    workflow
        .nodes
        .iter()
        .filter(|&n| !n.disabled && !is_entry_point(n))
        .filter(|n| graph.incoming_count(&n.name) == 0 && graph.outgoing_count(&n.name) == 0)
        .collect()
}

// =============================================================================
// NODE RESOLUTION
// =============================================================================

/// Reference to a node by id, by name, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
}

impl NodeRef {
    pub fn by_id(id: impl Into<String>) -> Self {
        NodeRef {
            node_id: Some(id.into()),
            node_name: None,
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        NodeRef {
            node_id: None,
            node_name: Some(name.into()),
        }
    }
}

impl std::fmt::Display for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.node_id, &self.node_name) {
            (Some(id), Some(name)) => write!(f, "id '{}' / name '{}'", id, name),
            (Some(id), None) => write!(f, "id '{}'", id),
            (None, Some(name)) => write!(f, "name '{}'", name),
            (None, None) => write!(f, "<empty reference>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Neither an id nor a name was supplied.
    Empty,
    NotFound(String),
    /// More than one node carries this name.
    Ambiguous { name: String, count: usize },
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveError::Empty => write!(f, "Node reference requires a nodeId or nodeName"),
            ResolveError::NotFound(reference) => write!(f, "Node not found: {}", reference),
            ResolveError::Ambiguous { name, count } => write!(
                f,
                "Node name '{}' is ambiguous ({} nodes share it)",
                name, count
            ),
        }
    }
}

impl std::error::Error for ResolveError {}

/// Resolve a node reference. The id wins when both are given; the name is
/// only consulted when the id is absent or matches nothing.
pub fn resolve_node<'a>(
    workflow: &'a Workflow,
    reference: &NodeRef,
) -> Result<&'a Node, ResolveError> {
    resolve_index(workflow, reference).map(|i| &workflow.nodes[i])
}

/// Same as [`resolve_node`] but yields the position in `workflow.nodes`.
pub fn resolve_index(workflow: &Workflow, reference: &NodeRef) -> Result<usize, ResolveError> {
    if reference.node_id.is_none() && reference.node_name.is_none() {
        return Err(ResolveError::Empty);
    }

    if let Some(id) = reference.node_id.as_deref().filter(|id| !id.is_empty()) {
        if let Some(i) = workflow.nodes.iter().position(|n| n.id == id) {
            return Ok(i);
        }
    }

    if let Some(name) = &reference.node_name {
        let matches: Vec<usize> = workflow
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| &n.name == name)
            .map(|(i, _)| i)
            .collect();
        return match matches.as_slice() {
            [i] => Ok(*i),
            [] => Err(ResolveError::NotFound(reference.to_string())),
            _ => Err(ResolveError::Ambiguous {
                name: name.clone(),
                count: matches.len(),
            }),
        };
    }

    Err(ResolveError::NotFound(reference.to_string()))
}
