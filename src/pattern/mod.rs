//! Structural pattern validation: recognises known-invalid nested parameter
//! shapes for specific node families and proposes a corrected shape.

pub mod autofix;
pub mod table;

use std::collections::HashMap;
use std::time::Duration;

use moka::sync::Cache;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

pub use table::{AutofixStrategy, StructuralPattern, builtin_patterns};

use crate::parse::types::node_kind;
use crate::path;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternError {
    /// Dotted path of the offending value.
    pub pattern: String,
    pub message: String,
    pub fix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternValidation {
    pub is_valid: bool,
    pub errors: Vec<PatternError>,
    /// Corrected configuration, present whenever `errors` is non-empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autofix: Option<Value>,
}

impl PatternValidation {
    fn valid() -> Self {
        PatternValidation {
            is_valid: true,
            errors: vec![],
            autofix: None,
        }
    }
}

/// Registry of structural patterns indexed by normalized node kind.
#[derive(Debug, Clone)]
pub struct StructuralValidator {
    patterns: Vec<StructuralPattern>,
    by_kind: HashMap<String, Vec<usize>>,
}

impl Default for StructuralValidator {
    fn default() -> Self {
        Self::with_patterns(builtin_patterns())
    }
}

impl StructuralValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patterns(patterns: Vec<StructuralPattern>) -> Self {
        let mut validator = StructuralValidator {
            patterns: Vec::new(),
            by_kind: HashMap::new(),
        };
        for pattern in patterns {
            validator.register(pattern);
        }
        validator
    }

    /// Add a node family. Aliases are normalized on the way in.
    pub fn register(&mut self, mut pattern: StructuralPattern) {
        pattern.node_type_aliases = pattern
            .node_type_aliases
            .iter()
            .map(|a| node_kind(a))
            .collect();
        let idx = self.patterns.len();
        for alias in &pattern.node_type_aliases {
            self.by_kind.entry(alias.clone()).or_default().push(idx);
        }
        self.patterns.push(pattern);
    }

    /// Owned copies of every registered pattern; mutating them cannot
    /// affect this registry.
    pub fn all_patterns(&self) -> Vec<StructuralPattern> {
        self.patterns.clone()
    }

    /// Owned copies of the patterns registered for `node_type`.
    pub fn patterns_for(&self, node_type: &str) -> Vec<StructuralPattern> {
        self.by_kind
            .get(&node_kind(node_type))
            .map(|idxs| idxs.iter().map(|&i| self.patterns[i].clone()).collect())
            .unwrap_or_default()
    }

    pub fn knows(&self, node_type: &str) -> bool {
        self.by_kind.contains_key(&node_kind(node_type))
    }

    pub fn validate(&self, node_type: &str, config: &Value) -> PatternValidation {
        let idxs = match self.by_kind.get(&node_kind(node_type)) {
            Some(idxs) => idxs,
            None => return PatternValidation::valid(),
        };
        check(idxs.iter().map(|&i| &self.patterns[i]), config)
    }

    /// Like [`validate`](Self::validate) but resolves the node family
    /// through `cache`.
    pub fn validate_cached(
        &self,
        cache: &PatternCache,
        node_type: &str,
        config: &Value,
    ) -> PatternValidation {
        let patterns = cache.patterns_for(self, node_type);
        check(patterns.iter(), config)
    }
}

fn check<'a>(
    patterns: impl Iterator<Item = &'a StructuralPattern>,
    config: &Value,
) -> PatternValidation {
    let mut errors = Vec::new();
    let mut fixed = config.clone();

    for pattern in patterns {
        // One finding per family: the deepest matching path wins.
        let Some(hit) = pattern
            .invalid_patterns
            .iter()
            .find(|p| path::get(config, p).is_some())
        else {
            continue;
        };

        errors.push(PatternError {
            pattern: hit.clone(),
            message: format!(
                "Invalid structure for {} node: found nested '{}' but expected {}",
                pattern.display_name, hit, pattern.expected_structure
            ),
            fix: fix_message(pattern, hit),
        });
        autofix::apply(pattern, hit, &mut fixed);
    }

    if errors.is_empty() {
        return PatternValidation::valid();
    }
    debug!(count = errors.len(), "structural pattern violations found");
    PatternValidation {
        is_valid: false,
        errors,
        autofix: Some(fixed),
    }
}

fn fix_message(pattern: &StructuralPattern, hit: &str) -> String {
    match pattern.autofix_strategy {
        AutofixStrategy::SwitchRules => format!(
            "Move each branch from '{}' into 'rules.values' as {{ conditions, outputKey }} entries",
            hit
        ),
        AutofixStrategy::FilterConditions => format!(
            "Replace '{}' with '{}.conditions' (an array) and set '{}.combinator'",
            hit, pattern.property_path, pattern.property_path
        ),
        AutofixStrategy::FlattenCollection => {
            let parent = hit.rsplit_once('.').map(|(p, _)| p).unwrap_or(hit);
            format!(
                "Remove the extra '{}' wrapper: '{}' should be an array",
                hit.rsplit('.').next().unwrap_or(hit),
                parent
            )
        }
    }
}

/// Default number of memoized node-family lookups.
const DEFAULT_PATTERN_CAPACITY: u64 = 256;

/// Default time-to-live for memoized lookups (5 minutes).
const DEFAULT_PATTERN_TTL_SECS: u64 = 300;

/// Memoizes node-type → pattern lookups. Reads return clones, so a caller
/// can never mutate a cached entry in place.
#[derive(Clone)]
pub struct PatternCache {
    cache: Cache<String, Vec<StructuralPattern>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::with_config(DEFAULT_PATTERN_CAPACITY, DEFAULT_PATTERN_TTL_SECS)
    }

    pub fn with_config(max_capacity: u64, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();
        Self { cache }
    }

    pub fn patterns_for(
        &self,
        validator: &StructuralValidator,
        node_type: &str,
    ) -> Vec<StructuralPattern> {
        let kind = node_kind(node_type);
        self.cache.get_with(kind, || validator.patterns_for(node_type))
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new()
    }
}
