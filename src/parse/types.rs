//! Wire types for agent-edited workflow graphs.
//!
//! These are the serde targets for the workflow JSON exchanged with the
//! automation server. Fields this crate does not interpret are kept in the
//! flattened `extra` maps so that a parse/serialize round-trip is lossless.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Connection type used for ordinary data flow between nodes.
pub const MAIN: &str = "main";

// =============================================================================
// TOP-LEVEL WORKFLOW
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub connections: ConnectionMap,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub settings: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Workflow {
    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn node_by_id(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| !n.id.is_empty() && n.id == id)
    }

    /// Output ports of `source` for the given connection type, if any.
    pub fn ports(&self, source: &str, kind: &str) -> Option<&Ports> {
        self.connections.get(source).and_then(|outputs| outputs.get(kind))
    }

    /// Iterate every connection as `(source, kind, output_index, endpoint)`.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, usize, &Endpoint)> {
        self.connections.iter().flat_map(|(source, outputs)| {
            outputs.iter().flat_map(move |(kind, ports)| {
                ports.iter().enumerate().flat_map(move |(index, port)| {
                    port.iter()
                        .map(move |endpoint| (source.as_str(), kind.as_str(), index, endpoint))
                })
            })
        })
    }
}

// =============================================================================
// NODES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_version: Option<f64>,
    #[serde(default)]
    pub position: [f64; 2],
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<OnErrorPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Node {
    /// Normalized kind of this node's type, see [`node_kind`].
    pub fn kind(&self) -> String {
        node_kind(&self.node_type)
    }

    /// Heuristic entry-point detection used when no registry metadata is available.
    pub fn looks_like_trigger(&self) -> bool {
        let kind = self.kind();
        kind.ends_with("trigger") || matches!(kind.as_str(), "webhook" | "start")
    }

    pub fn has_error_output(&self) -> bool {
        self.on_error == Some(OnErrorPolicy::ContinueErrorOutput)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OnErrorPolicy {
    StopWorkflow,
    ContinueRegularOutput,
    /// Routes failed items to output port 1.
    ContinueErrorOutput,
}

/// Lowercase the type and strip any package/namespace prefix, so that
/// `PackageA.switch`, `switch` and `SWITCH` compare equal.
pub fn node_kind(node_type: &str) -> String {
    let tail = node_type.rsplit('.').next().unwrap_or(node_type);
    tail.trim().to_ascii_lowercase()
}

// =============================================================================
// CONNECTIONS
// =============================================================================

/// Source node name -> connection type -> ordered output ports.
pub type ConnectionMap = BTreeMap<String, NodeOutputs>;

pub type NodeOutputs = BTreeMap<String, Ports>;

/// A single output port: the endpoints it fans out to.
pub type Port = Vec<Endpoint>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub node: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub index: usize,
}

impl Endpoint {
    pub fn main(node: impl Into<String>) -> Self {
        Endpoint {
            node: node.into(),
            kind: MAIN.to_string(),
            index: 0,
        }
    }
}

fn default_kind() -> String {
    MAIN.to_string()
}

/// Ordered output ports of one connection type. Port index 0 is the
/// success output; nodes routing errors separately use port 1.
///
/// Exported workflows sometimes contain `null` for unused ports, which
/// deserialize to empty ports here.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct Ports(pub Vec<Port>);

impl<'de> Deserialize<'de> for Ports {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Vec::<Option<Port>>::deserialize(deserializer)?;
        Ok(Ports(raw.into_iter().map(Option::unwrap_or_default).collect()))
    }
}

impl Deref for Ports {
    type Target = Vec<Port>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Ports {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<Vec<Port>> for Ports {
    fn from(ports: Vec<Port>) -> Self {
        Ports(ports)
    }
}
