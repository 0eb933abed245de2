//! Collaborator seams: node-type metadata and similar-name suggestions.
//!
//! The real registry lives outside this crate (a searchable node catalogue).
//! [`StaticRegistry`] is an in-memory stand-in fed from JSON, used by the wasm
//! boundary and by tests.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::RequestError;
use crate::parse::types::node_kind;

// =============================================================================
// NODE TYPE METADATA
// =============================================================================

/// Read-only schema of one node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypeInfo {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    /// Supported `typeVersion` values. Empty for unversioned types.
    #[serde(default)]
    pub versions: Vec<f64>,
    #[serde(default)]
    pub is_trigger: bool,
}

impl NodeTypeInfo {
    pub fn latest_version(&self) -> Option<f64> {
        self.versions.iter().copied().reduce(f64::max)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDef {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(rename = "type", default)]
    pub kind: PropertyKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<PropertyOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_options: Option<DisplayOptions>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyKind {
    #[default]
    String,
    Number,
    Boolean,
    Options,
    MultiOptions,
    Collection,
    FixedCollection,
    Json,
    Notice,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyOption {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: Option<Value>,
}

/// Show/hide rules keyed by sibling parameter name (or `@version`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayOptions {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub show: BTreeMap<String, Vec<Value>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hide: BTreeMap<String, Vec<Value>>,
}

pub trait NodeTypeRegistry: Send + Sync {
    fn lookup(&self, node_type: &str) -> Option<NodeTypeInfo>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    types: HashMap<String, NodeTypeInfo>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON array of node type descriptions.
    pub fn from_json(json: &str) -> Result<Self, RequestError> {
        let types: Vec<NodeTypeInfo> =
            serde_json::from_str(json).map_err(|e| RequestError::json("node types", e))?;
        Ok(types.into_iter().collect())
    }

    pub fn register(&mut self, info: NodeTypeInfo) {
        self.types.insert(info.node_type.clone(), info);
    }

    pub fn node_types(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl FromIterator<NodeTypeInfo> for StaticRegistry {
    fn from_iter<I: IntoIterator<Item = NodeTypeInfo>>(iter: I) -> Self {
        let mut registry = StaticRegistry::new();
        for info in iter {
            registry.register(info);
        }
        registry
    }
}

impl NodeTypeRegistry for StaticRegistry {
    fn lookup(&self, node_type: &str) -> Option<NodeTypeInfo> {
        self.types.get(node_type).cloned()
    }
}

// =============================================================================
// SUGGESTIONS
// =============================================================================

/// Ranked guesses for what an unknown identifier was meant to be.
/// Purely advisory: an empty answer never changes a validation verdict.
pub trait SimilaritySource: Send + Sync {
    fn suggest(&self, unknown: &str, limit: usize) -> Vec<String>;
}

/// Suggests known node types by edit distance on their normalized kind.
#[derive(Debug, Clone, Default)]
pub struct EditDistanceSuggester {
    candidates: Vec<String>,
}

impl EditDistanceSuggester {
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut candidates: Vec<String> = candidates.into_iter().map(Into::into).collect();
        candidates.sort();
        candidates.dedup();
        EditDistanceSuggester { candidates }
    }

    pub fn from_registry(registry: &StaticRegistry) -> Self {
        Self::new(registry.node_types())
    }
}

impl SimilaritySource for EditDistanceSuggester {
    fn suggest(&self, unknown: &str, limit: usize) -> Vec<String> {
        let wanted = node_kind(unknown);
        if wanted.is_empty() {
            return vec![];
        }
        let threshold = (wanted.len() / 3).max(2);

        let mut scored: Vec<(usize, &String)> = self
            .candidates
            .iter()
            .filter_map(|candidate| {
                let kind = node_kind(candidate);
                let distance = levenshtein(&wanted, &kind);
                if distance <= threshold {
                    Some((distance, candidate))
                } else if kind.contains(&wanted) || wanted.contains(&kind) {
                    Some((threshold + 1, candidate))
                } else {
                    None
                }
            })
            .collect();
        scored.sort();
        scored.into_iter().take(limit).map(|(_, c)| c.clone()).collect()
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Default number of memoized suggestion lists.
const DEFAULT_SUGGESTION_CAPACITY: u64 = 1_000;

/// Default time-to-live for memoized suggestions (10 minutes).
const DEFAULT_SUGGESTION_TTL_SECS: u64 = 600;

/// Memoizes suggestion lookups. Owned by the caller; entries expire after
/// the configured TTL and every read hands back a fresh clone.
#[derive(Clone)]
pub struct SuggestionCache {
    cache: Cache<(String, usize), Vec<String>>,
}

impl SuggestionCache {
    pub fn new() -> Self {
        Self::with_config(DEFAULT_SUGGESTION_CAPACITY, DEFAULT_SUGGESTION_TTL_SECS)
    }

    pub fn with_config(max_capacity: u64, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();
        Self { cache }
    }

    pub fn suggest(
        &self,
        source: &dyn SimilaritySource,
        unknown: &str,
        limit: usize,
    ) -> Vec<String> {
        let key = (unknown.to_string(), limit);
        if let Some(hit) = self.cache.get(&key) {
            debug!(unknown, "suggestion cache hit");
            return hit;
        }
        let suggestions = source.suggest(unknown, limit);
        self.cache.insert(key, suggestions.clone());
        suggestions
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for SuggestionCache {
    fn default() -> Self {
        Self::new()
    }
}
