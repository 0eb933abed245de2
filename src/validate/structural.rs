//! Graph-level structural validation rules (S001–S013).

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex_lite::Regex;

use super::report::{Finding, Tier};
use crate::error::Category;
use crate::parse::graph::{WorkflowGraph, detect_cycle, find_orphans};
use crate::parse::types::{MAIN, Node, Workflow};

/// Nodes whose second main output is a regular branch, not an error route.
const MULTI_OUTPUT_KINDS: &[&str] = &[
    "if",
    "switch",
    "filter",
    "splitinbatches",
    "comparedatasets",
    "removeduplicates",
    "form",
];

/// Workflow-wide sanity checks. Returns false when there is nothing else to
/// validate.
pub fn validate_shape(
    workflow: &Workflow,
    is_entry_point: &dyn Fn(&Node) -> bool,
    out: &mut Vec<Finding>,
) -> bool {
    if !s012_not_empty(workflow, out) {
        return false;
    }
    s013_not_all_disabled(workflow, out);
    s008_has_trigger(workflow, is_entry_point, out);
    true
}

/// Rules that need nothing but the node list.
pub fn validate_nodes_unique(workflow: &Workflow, out: &mut Vec<Finding>) {
    s001_unique_node_names(workflow, out);
    s002_unique_node_ids(workflow, out);
}

/// Broken connection references. Always run, whatever the options say.
pub fn validate_references(workflow: &Workflow, graph: &WorkflowGraph, out: &mut Vec<Finding>) {
    s003_connections_reference_existing_nodes(workflow, graph, out);
}

/// Topology and wiring rules.
pub fn validate_topology(
    workflow: &Workflow,
    graph: &WorkflowGraph,
    is_entry_point: &dyn Fn(&Node) -> bool,
    out: &mut Vec<Finding>,
) {
    s006_no_cycles(graph, out);
    s007_no_orphans(workflow, graph, is_entry_point, out);
    s009_error_output_wiring(workflow, out);
}

fn s001_unique_node_names(workflow: &Workflow, out: &mut Vec<Finding>) {
    let mut seen = HashSet::new();
    for node in &workflow.nodes {
        if !seen.insert(node.name.as_str()) {
            out.push(
                Finding::error(
                    "S001",
                    Category::Structural,
                    Tier::Essential,
                    format!("Duplicate node name '{}'", node.name),
                )
                .node(&node.id, &node.name)
                .fix("Node names must be unique; connections reference nodes by name"),
            );
        }
    }
}

fn s002_unique_node_ids(workflow: &Workflow, out: &mut Vec<Finding>) {
    let mut seen = HashSet::new();
    for node in &workflow.nodes {
        if !node.id.is_empty() && !seen.insert(node.id.as_str()) {
            out.push(
                Finding::error(
                    "S002",
                    Category::Structural,
                    Tier::Essential,
                    format!("Duplicate node id '{}'", node.id),
                )
                .node(&node.id, &node.name),
            );
        }
    }
}

fn s008_has_trigger(
    workflow: &Workflow,
    is_entry_point: &dyn Fn(&Node) -> bool,
    out: &mut Vec<Finding>,
) {
    let enabled: Vec<&Node> = workflow.nodes.iter().filter(|n| !n.disabled).collect();
    if enabled.is_empty() || enabled.iter().any(|&n| is_entry_point(n)) {
        return;
    }
    out.push(
        Finding::warning(
            "S008",
            Category::Structural,
            Tier::Standard,
            "Workflow has no trigger node and can only be started manually",
        )
        .fix("Add a trigger node to start the workflow"),
    );
}

fn s012_not_empty(workflow: &Workflow, out: &mut Vec<Finding>) -> bool {
    if !workflow.nodes.is_empty() {
        return true;
    }
    out.push(
        Finding::warning("S012", Category::Structural, Tier::Essential, "Workflow is empty")
            .fix("Add at least one trigger node"),
    );
    false
}

fn s013_not_all_disabled(workflow: &Workflow, out: &mut Vec<Finding>) {
    if workflow.nodes.iter().all(|n| n.disabled) {
        out.push(Finding::warning(
            "S013",
            Category::Structural,
            Tier::Standard,
            "All nodes are disabled; the workflow will do nothing",
        ));
    }
}

fn s003_connections_reference_existing_nodes(
    workflow: &Workflow,
    graph: &WorkflowGraph,
    out: &mut Vec<Finding>,
) {
    let by_id: HashMap<&str, &str> = workflow
        .nodes
        .iter()
        .filter(|n| !n.id.is_empty())
        .map(|n| (n.id.as_str(), n.name.as_str()))
        .collect();

    for edge in &graph.dangling {
        if edge.missing_source {
            out.push(broken_reference(&by_id, &edge.source, "source"));
        }
        if edge.missing_target {
            out.push(broken_reference(&by_id, &edge.target.node, "target"));
        }
    }
}

fn broken_reference(by_id: &HashMap<&str, &str>, reference: &str, side: &str) -> Finding {
    match by_id.get(reference) {
        Some(name) => Finding::error(
            "S005",
            Category::Structural,
            Tier::Critical,
            format!(
                "Connection uses node ID '{}' instead of node name '{}'",
                reference, name
            ),
        )
        .fix(format!("Reference the {} node by its name '{}'", side, name)),
        None => Finding::error(
            if side == "source" { "S003" } else { "S004" },
            Category::Structural,
            Tier::Critical,
            format!("Connection references unknown {} node '{}'", side, reference),
        ),
    }
}

fn s006_no_cycles(graph: &WorkflowGraph, out: &mut Vec<Finding>) {
    let Some(cycle) = detect_cycle(&graph.adjacency()) else {
        return;
    };
    let mut path = cycle.clone();
    path.push(cycle[0].clone());
    out.push(
        Finding::error(
            "S006",
            Category::Structural,
            Tier::Essential,
            format!("Workflow contains a cycle: {}", path.join(" -> ")),
        )
        .node("", &cycle[0]),
    );
}

fn s007_no_orphans(
    workflow: &Workflow,
    graph: &WorkflowGraph,
    is_entry_point: &dyn Fn(&Node) -> bool,
    out: &mut Vec<Finding>,
) {
    for node in find_orphans(workflow, graph, is_entry_point) {
        out.push(
            Finding::warning(
                "S007",
                Category::Structural,
                Tier::Standard,
                "Node is not connected to any other nodes",
            )
            .node(&node.id, &node.name),
        );
    }
}

fn error_handler_regex() -> &'static Regex {
    static ERROR_HANDLER: OnceLock<Regex> = OnceLock::new();
    ERROR_HANDLER
        .get_or_init(|| Regex::new(r"(?i)error|fail|catch|exception").expect("valid regex"))
}

fn looks_like_error_handler(workflow: &Workflow, name: &str) -> bool {
    if error_handler_regex().is_match(name) {
        return true;
    }
    workflow
        .node_by_name(name)
        .is_some_and(|n| matches!(n.kind().as_str(), "stopanderror" | "errortrigger"))
}

fn s009_error_output_wiring(workflow: &Workflow, out: &mut Vec<Finding>) {
    for node in workflow.nodes.iter().filter(|n| !n.disabled) {
        let ports = workflow.ports(&node.name, MAIN);
        let success = ports.and_then(|p| p.first()).map(Vec::as_slice).unwrap_or(&[]);
        let error_port_used = ports
            .and_then(|p| p.get(1))
            .is_some_and(|port| !port.is_empty());

        let (handlers, regular): (Vec<&str>, Vec<&str>) = success
            .iter()
            .map(|e| e.node.as_str())
            .partition(|name| looks_like_error_handler(workflow, name));

        if !error_port_used && !handlers.is_empty() && !regular.is_empty() {
            out.push(
                Finding::error(
                    "S009",
                    Category::Structural,
                    Tier::Essential,
                    format!(
                        "Incorrect error output configuration: {} appear to be error handlers \
                         but are connected to output 0 (success) together with {}",
                        quote_all(&handlers),
                        quote_all(&regular)
                    ),
                )
                .node(&node.id, &node.name)
                .fix(
                    "Move the error handlers to main[1] and set onError to 'continueErrorOutput'",
                ),
            );
            continue;
        }

        if node.has_error_output() && !error_port_used {
            out.push(
                Finding::error(
                    "S010",
                    Category::Structural,
                    Tier::Essential,
                    "Node has onError 'continueErrorOutput' but no error output connections \
                     in main[1]",
                )
                .node(&node.id, &node.name)
                .property("onError")
                .fix("Connect an error handler to output 1, or change onError"),
            );
        } else if !node.has_error_output()
            && error_port_used
            && !MULTI_OUTPUT_KINDS.contains(&node.kind().as_str())
        {
            out.push(
                Finding::error(
                    "S011",
                    Category::Structural,
                    Tier::Runtime,
                    "Node has connections on main[1] but onError is not 'continueErrorOutput'",
                )
                .node(&node.id, &node.name)
                .property("onError")
                .fix("Set onError to 'continueErrorOutput' so output 1 receives failed items"),
            );
        }
    }
}

fn quote_all(names: &[&str]) -> String {
    names
        .iter()
        .map(|n| format!("'{}'", n))
        .collect::<Vec<_>>()
        .join(", ")
}
