//! Workflow validation phase.
//!
//! Runs the schema, structural, node-rule, expression and pattern checks over
//! a workflow and folds their findings into one profile-scoped report.

pub mod node_rules;
pub mod report;
pub mod schema;
pub mod structural;

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

pub use node_rules::{NodeRule, NodeRules};
pub use report::{
    Collector, Finding, Profile, Severity, Statistics, Tier, ValidationIssue, ValidationMode,
    ValidationReport,
};

use crate::error::Category;
use crate::expression::{self, ExpressionContext};
use crate::parse::graph::WorkflowGraph;
use crate::parse::types::{Node, Workflow};
use crate::pattern::{PatternCache, PatternValidation, StructuralValidator};
use crate::registry::{NodeTypeInfo, NodeTypeRegistry, SimilaritySource, SuggestionCache};

/// How many alternatives to offer for an unknown node type.
const MAX_TYPE_SUGGESTIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationOptions {
    pub validate_nodes: bool,
    pub validate_connections: bool,
    pub validate_expressions: bool,
    pub profile: Profile,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        ValidationOptions {
            validate_nodes: true,
            validate_connections: true,
            validate_expressions: true,
            profile: Profile::default(),
        }
    }
}

impl ValidationOptions {
    pub fn with_profile(profile: Profile) -> Self {
        ValidationOptions {
            profile,
            ..Default::default()
        }
    }
}

/// Validator bound to a node-type registry plus optional advisory
/// collaborators. Holds no per-request state, so one instance can serve
/// concurrent callers.
pub struct WorkflowValidator<'a> {
    registry: &'a dyn NodeTypeRegistry,
    similarity: Option<&'a dyn SimilaritySource>,
    suggestion_cache: Option<&'a SuggestionCache>,
    patterns: StructuralValidator,
    pattern_cache: Option<&'a PatternCache>,
    node_rules: NodeRules,
}

impl<'a> WorkflowValidator<'a> {
    pub fn new(registry: &'a dyn NodeTypeRegistry) -> Self {
        WorkflowValidator {
            registry,
            similarity: None,
            suggestion_cache: None,
            patterns: StructuralValidator::default(),
            pattern_cache: None,
            node_rules: NodeRules::default(),
        }
    }

    pub fn with_similarity(mut self, source: &'a dyn SimilaritySource) -> Self {
        self.similarity = Some(source);
        self
    }

    pub fn with_suggestion_cache(mut self, cache: &'a SuggestionCache) -> Self {
        self.suggestion_cache = Some(cache);
        self
    }

    pub fn with_patterns(mut self, patterns: StructuralValidator) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn with_pattern_cache(mut self, cache: &'a PatternCache) -> Self {
        self.pattern_cache = Some(cache);
        self
    }

    pub fn with_node_rules(mut self, rules: NodeRules) -> Self {
        self.node_rules = rules;
        self
    }

    pub fn patterns(&self) -> &StructuralValidator {
        &self.patterns
    }

    /// Validate a whole workflow.
    pub fn validate(&self, workflow: &Workflow, options: &ValidationOptions) -> ValidationReport {
        let graph = WorkflowGraph::build(workflow);
        self.validate_graph(workflow, &graph, options)
    }

    /// Validate a workflow whose graph has already been built.
    #[instrument(skip_all, fields(nodes = workflow.nodes.len(), profile = ?options.profile))]
    pub fn validate_graph(
        &self,
        workflow: &Workflow,
        graph: &WorkflowGraph,
        options: &ValidationOptions,
    ) -> ValidationReport {
        let mut collector = Collector::new(options.profile);
        let mut findings = Vec::new();
        let mut statistics = Statistics {
            total_nodes: workflow.nodes.len(),
            enabled_nodes: workflow.nodes.iter().filter(|n| !n.disabled).count(),
            valid_connections: graph.graph.edge_count(),
            invalid_connections: graph.dangling.len(),
            ..Default::default()
        };

        // Type resolution happens once; later phases reuse the infos.
        let infos: Vec<Option<NodeTypeInfo>> = workflow
            .nodes
            .iter()
            .map(|node| self.resolve_type(node, &mut findings))
            .collect();

        let trigger_types: HashSet<&str> = infos
            .iter()
            .flatten()
            .filter(|info| info.is_trigger)
            .map(|info| info.node_type.as_str())
            .collect();
        let is_entry_point =
            |n: &Node| n.looks_like_trigger() || trigger_types.contains(n.node_type.as_str());
        statistics.trigger_nodes = workflow
            .nodes
            .iter()
            .filter(|&n| !n.disabled && is_entry_point(n))
            .count();

        if !structural::validate_shape(workflow, &is_entry_point, &mut findings) {
            collector.extend(findings);
            return collector.finish(statistics);
        }
        structural::validate_nodes_unique(workflow, &mut findings);
        structural::validate_references(workflow, graph, &mut findings);
        if options.validate_connections {
            structural::validate_topology(workflow, graph, &is_entry_point, &mut findings);
        }

        for (node, info) in workflow.nodes.iter().zip(&infos) {
            self.check_patterns(node, &mut findings, &mut collector);
            if node.disabled {
                continue;
            }
            if options.validate_nodes {
                let schema_start = findings.len();
                if let Some(info) = info {
                    schema::check_version(node, info, &mut findings);
                    // Full depth: unknown-property findings are strict-tier and
                    // filtered by the collector.
                    schema::check_properties(node, info, ValidationMode::Full, &mut findings);
                }
                self.run_node_rules(node, schema_start, &mut findings);
            }
        }

        if options.validate_expressions {
            let names: BTreeSet<String> = workflow.nodes.iter().map(|n| n.name.clone()).collect();
            for node in workflow.nodes.iter().filter(|n| !n.disabled) {
                let ctx = ExpressionContext {
                    available_nodes: Some(&names),
                    current_node: Some(&node.name),
                    has_input_data: graph.incoming_count(&node.name) > 0,
                };
                statistics.expressions_validated +=
                    check_expressions(node, &node.parameters, &ctx, &mut findings);
            }
        }

        collector.extend(findings);
        add_suggestions(workflow, statistics.trigger_nodes, &mut collector);

        let report = collector.finish(statistics);
        debug!(
            valid = report.valid,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "workflow validated"
        );
        report
    }

    /// Validate one node's configuration outside any workflow.
    #[instrument(skip(self, config))]
    pub fn validate_node(
        &self,
        node_type: &str,
        config: &Value,
        mode: ValidationMode,
        profile: Profile,
    ) -> ValidationReport {
        let mut collector = Collector::new(profile);
        let mut findings = Vec::new();

        let parameters = match config {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                collector.push(Finding::error(
                    "C002",
                    Category::Schema,
                    Tier::Critical,
                    format!("Node configuration must be an object, got {}", other),
                ));
                return collector.finish(Statistics::default());
            }
        };
        let node = Node {
            id: String::new(),
            name: node_type.to_string(),
            node_type: node_type.to_string(),
            type_version: None,
            position: [0.0, 0.0],
            parameters,
            disabled: false,
            on_error: None,
            credentials: None,
            extra: Map::new(),
        };

        let info = self.resolve_type(&node, &mut findings);
        let schema_start = findings.len();
        if let Some(info) = info {
            schema::check_properties(&node, &info, mode, &mut findings);
        }
        self.run_node_rules(&node, schema_start, &mut findings);
        self.check_patterns(&node, &mut findings, &mut collector);

        let ctx = ExpressionContext {
            has_input_data: true,
            ..Default::default()
        };
        let expressions_validated = check_expressions(&node, &node.parameters, &ctx, &mut findings);

        collector.extend(findings);
        collector.finish(Statistics {
            total_nodes: 1,
            enabled_nodes: 1,
            expressions_validated,
            ..Default::default()
        })
    }

    /// Check the type string, then look it up. Malformed types never reach
    /// the registry.
    fn resolve_type(&self, node: &Node, out: &mut Vec<Finding>) -> Option<NodeTypeInfo> {
        if let Some(finding) = schema::check_type_format(&node.node_type) {
            out.push(finding.node(&node.id, &node.name).property("type"));
            return None;
        }
        let info = self.registry.lookup(&node.node_type);
        if info.is_none() {
            let suggestions = self.suggest_types(&node.node_type);
            out.push(schema::unknown_type(node, &suggestions));
        }
        info
    }

    fn suggest_types(&self, unknown: &str) -> Vec<String> {
        let Some(source) = self.similarity else {
            return vec![];
        };
        match self.suggestion_cache {
            Some(cache) => cache.suggest(source, unknown, MAX_TYPE_SUGGESTIONS),
            None => source.suggest(unknown, MAX_TYPE_SUGGESTIONS),
        }
    }

    /// Run the node's family rules, skipping findings on properties the
    /// schema checks from `schema_start` on already reported as missing.
    fn run_node_rules(&self, node: &Node, schema_start: usize, out: &mut Vec<Finding>) {
        let missing: Vec<String> = out[schema_start..]
            .iter()
            .filter(|f| f.issue.code == "C001")
            .filter_map(|f| f.issue.property.clone())
            .collect();
        let findings = self.node_rules.run(node);
        out.extend(findings.into_iter().filter(|f| {
            f.issue
                .property
                .as_ref()
                .is_none_or(|p| !missing.contains(p))
        }));
    }

    fn check_patterns(&self, node: &Node, out: &mut Vec<Finding>, collector: &mut Collector) {
        if !self.patterns.knows(&node.node_type) {
            return;
        }
        let config = Value::Object(node.parameters.clone());
        let PatternValidation { errors, autofix, .. } = match self.pattern_cache {
            Some(cache) => self.patterns.validate_cached(cache, &node.node_type, &config),
            None => self.patterns.validate(&node.node_type, &config),
        };
        for error in &errors {
            out.push(
                Finding::error("T001", Category::Pattern, Tier::Critical, error.message.clone())
                    .node(&node.id, &node.name)
                    .property(format!("parameters.{}", error.pattern))
                    .fix(error.fix.clone()),
            );
        }
        if autofix.is_some() {
            collector.suggest(format!(
                "Apply the suggested autofix to the parameters of node '{}'",
                node.name
            ));
        }
    }
}

/// Scan a parameter tree and turn its findings into issues. Returns the
/// number of expression strings seen.
fn check_expressions(
    node: &Node,
    parameters: &Map<String, Value>,
    ctx: &ExpressionContext<'_>,
    out: &mut Vec<Finding>,
) -> usize {
    let result = expression::validate_parameters(parameters, ctx);
    for issue in result.errors {
        let mut finding = Finding::error("X001", Category::Expression, Tier::Runtime, issue.message)
            .node(&node.id, &node.name);
        if let Some(path) = issue.path {
            finding = finding.property(path);
        }
        out.push(finding);
    }
    for issue in result.warnings {
        let mut finding =
            Finding::warning("X002", Category::Expression, Tier::Standard, issue.message)
                .node(&node.id, &node.name);
        if let Some(path) = issue.path {
            finding = finding.property(path);
        }
        out.push(finding);
    }
    result.expression_count
}

fn add_suggestions(workflow: &Workflow, trigger_nodes: usize, collector: &mut Collector) {
    if trigger_nodes == 0 && workflow.nodes.iter().any(|n| !n.disabled) {
        collector.suggest("Add a trigger node to start the workflow");
    }
    if collector.has_error("C010") {
        collector.suggest("Check unknown node types against the node catalogue");
    }
    if collector.has_error("S005") {
        collector.suggest("Connections must reference nodes by name, not by id");
    }
    if collector.has_error("S006") {
        collector.suggest("Remove one connection of the cycle; workflows must be acyclic");
    }
    if collector.profile() != Profile::Strict {
        return;
    }
    if !workflow.settings.contains_key("errorWorkflow") {
        collector.suggest("Consider setting an error workflow in the workflow settings");
    }
    let unguarded = workflow
        .nodes
        .iter()
        .filter(|n| !n.disabled && n.on_error.is_none() && n.kind() == "httprequest")
        .count();
    if unguarded > 0 {
        collector.suggest(format!(
            "Consider adding error handling (onError) and retries to the {} HTTP Request node(s)",
            unguarded
        ));
    }
}
