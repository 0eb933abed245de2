//! Diff request/response wire shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::RequestError;
use crate::parse::graph::{NodeRef, ResolveError};
use crate::parse::types::{MAIN, OnErrorPolicy, Workflow};
use crate::validate::ValidationReport;

// =============================================================================
// OPERATIONS
// =============================================================================

/// One requested edit, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DiffOperation {
    AddNode(AddNode),
    RemoveNode(NodeTarget),
    UpdateNode(UpdateNode),
    MoveNode(MoveNode),
    EnableNode(NodeTarget),
    DisableNode(NodeTarget),
    AddConnection(ConnectionSpec),
    RemoveConnection(ConnectionSpec),
    UpdateConnection(UpdateConnection),
    UpdateSettings(UpdateSettings),
    UpdateName(UpdateName),
    AddTag(TagChange),
    RemoveTag(TagChange),
}

/// Application phase. Operations are applied phase by phase, in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Nodes,
    Connections,
    Metadata,
}

impl DiffOperation {
    pub fn phase(&self) -> Phase {
        match self {
            DiffOperation::AddNode(_)
            | DiffOperation::RemoveNode(_)
            | DiffOperation::UpdateNode(_)
            | DiffOperation::MoveNode(_)
            | DiffOperation::EnableNode(_)
            | DiffOperation::DisableNode(_) => Phase::Nodes,
            DiffOperation::AddConnection(_)
            | DiffOperation::RemoveConnection(_)
            | DiffOperation::UpdateConnection(_) => Phase::Connections,
            DiffOperation::UpdateSettings(_)
            | DiffOperation::UpdateName(_)
            | DiffOperation::AddTag(_)
            | DiffOperation::RemoveTag(_) => Phase::Metadata,
        }
    }

    /// Wire name of the operation type.
    pub fn name(&self) -> &'static str {
        match self {
            DiffOperation::AddNode(_) => "addNode",
            DiffOperation::RemoveNode(_) => "removeNode",
            DiffOperation::UpdateNode(_) => "updateNode",
            DiffOperation::MoveNode(_) => "moveNode",
            DiffOperation::EnableNode(_) => "enableNode",
            DiffOperation::DisableNode(_) => "disableNode",
            DiffOperation::AddConnection(_) => "addConnection",
            DiffOperation::RemoveConnection(_) => "removeConnection",
            DiffOperation::UpdateConnection(_) => "updateConnection",
            DiffOperation::UpdateSettings(_) => "updateSettings",
            DiffOperation::UpdateName(_) => "updateName",
            DiffOperation::AddTag(_) => "addTag",
            DiffOperation::RemoveTag(_) => "removeTag",
        }
    }
}

/// Node payload of `addNode`. Everything but `name` and `type` has a default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_version: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[f64; 2]>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<OnErrorPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddNode {
    pub node: NodeSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Operation that addresses one existing node by id or name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NodeTarget {
    pub fn reference(&self) -> NodeRef {
        NodeRef {
            node_id: self.node_id.clone(),
            node_name: self.node_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    /// Dotted path (`parameters.url`, `name`, ...) to new value.
    pub updates: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UpdateNode {
    pub fn reference(&self) -> NodeRef {
        NodeRef {
            node_id: self.node_id.clone(),
            node_name: self.node_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    pub position: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl MoveNode {
    pub fn reference(&self) -> NodeRef {
        NodeRef {
            node_id: self.node_id.clone(),
            node_name: self.node_name.clone(),
        }
    }
}

/// One connection. `source`/`target` accept a node id or name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSpec {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ConnectionSpec {
    pub fn source_output(&self) -> &str {
        self.source_output.as_deref().unwrap_or(MAIN)
    }

    pub fn target_input(&self) -> &str {
        self.target_input.as_deref().unwrap_or(MAIN)
    }

    pub fn source_index(&self) -> usize {
        self.source_index.unwrap_or(0)
    }

    pub fn target_index(&self) -> usize {
        self.target_index.unwrap_or(0)
    }
}

/// New port coordinates for `updateConnection`; absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_index: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateConnection {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_index: Option<usize>,
    pub changes: ConnectionChanges,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UpdateConnection {
    /// The connection as it exists now, and as it should be afterwards.
    pub fn split(&self) -> (ConnectionSpec, ConnectionSpec) {
        let current = ConnectionSpec {
            source: self.source.clone(),
            target: self.target.clone(),
            source_output: self.source_output.clone(),
            target_input: self.target_input.clone(),
            source_index: self.source_index,
            target_index: self.target_index,
            description: None,
        };
        let updated = ConnectionSpec {
            source_output: self.changes.source_output.clone().or(current.source_output.clone()),
            target_input: self.changes.target_input.clone().or(current.target_input.clone()),
            source_index: self.changes.source_index.or(current.source_index),
            target_index: self.changes.target_index.or(current.target_index),
            ..current.clone()
        };
        (current, updated)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettings {
    pub settings: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateName {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagChange {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// =============================================================================
// REQUEST
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffRequest {
    /// Id of the workflow the batch targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub operations: Vec<DiffOperation>,
    #[serde(default)]
    pub validate_only: bool,
}

/// A request whose operations have not been typed yet. Lets the engine
/// enforce the operation cap before looking inside any operation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDiffRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub operations: Vec<Value>,
    #[serde(default)]
    pub validate_only: bool,
}

impl RawDiffRequest {
    pub fn from_json(json: &str) -> Result<Self, RequestError> {
        serde_json::from_str(json).map_err(|e| RequestError::json("diff request", e))
    }

    /// Type every operation, naming the first one that does not parse.
    pub fn into_request(self) -> Result<DiffRequest, RequestError> {
        let operations = self
            .operations
            .into_iter()
            .enumerate()
            .map(|(index, op)| {
                serde_json::from_value(op).map_err(|e| RequestError::MalformedOperation {
                    index,
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<DiffOperation>, _>>()?;
        Ok(DiffRequest {
            id: self.id,
            operations,
            validate_only: self.validate_only,
        })
    }
}

// =============================================================================
// RESULT
// =============================================================================

/// Why a single operation could not be applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Node name is required")]
    MissingName,

    #[error("{0}")]
    InvalidType(String),

    #[error("Node with name '{0}' already exists")]
    DuplicateName(String),

    #[error("Node with id '{0}' already exists")]
    DuplicateId(String),

    #[error("Cannot change the id of node '{0}'")]
    IdChange(String),

    #[error("Invalid update for node '{node}': {message}")]
    InvalidUpdate { node: String, message: String },

    #[error("{side} index {index} is out of range (at most {max})")]
    PortIndexOutOfRange {
        side: &'static str,
        index: usize,
        max: usize,
    },

    #[error("Connection {0} already exists")]
    ConnectionExists(String),

    #[error("Connection {0} not found")]
    ConnectionNotFound(String),

    #[error("Workflow name must not be empty")]
    EmptyName,

    #[error("Tag must not be empty")]
    EmptyTag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffError {
    /// Position of the failing operation in the submitted list.
    pub operation: usize,
    pub operation_type: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<Workflow>,
    pub operations_applied: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<DiffError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
}
