//! Per-node-family configuration rules.
//!
//! Rules are registered against a normalized node kind (see
//! [`node_kind`](crate::parse::types::node_kind)); adding a family means
//! registering another entry, not editing a central match.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::report::{Finding, Tier};
use super::schema::is_expression;
use crate::error::Category;
use crate::parse::types::Node;

pub type NodeRule = fn(&Node, &mut Vec<Finding>);

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

const MERGE_MODES: &[&str] = &[
    "append",
    "combine",
    "combineAll",
    "combineByFields",
    "combineByPosition",
    "combineBySql",
    "chooseBranch",
    "mergeByIndex",
    "mergeByKey",
    "multiplex",
    "passThrough",
    "wait",
];

#[derive(Debug, Clone)]
pub struct NodeRules {
    rules: HashMap<String, NodeRule>,
}

impl Default for NodeRules {
    fn default() -> Self {
        let mut rules = NodeRules::empty();
        rules.register("httprequest", http_request);
        rules.register("webhook", webhook);
        rules.register("code", code);
        rules.register("set", set);
        rules.register("switch", switch);
        rules.register("if", conditions);
        rules.register("filter", conditions);
        rules.register("wait", wait);
        rules.register("merge", merge);
        rules.register("scheduletrigger", schedule_trigger);
        rules
    }
}

impl NodeRules {
    pub fn empty() -> Self {
        NodeRules {
            rules: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: &str, rule: NodeRule) {
        self.rules.insert(kind.to_ascii_lowercase(), rule);
    }

    /// Run the rule registered for the node's kind, if any.
    pub fn run(&self, node: &Node) -> Vec<Finding> {
        let mut findings = Vec::new();
        if let Some(rule) = self.rules.get(&node.kind()) {
            rule(node, &mut findings);
        }
        findings
    }
}

fn str_param<'a>(params: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

fn blank(params: &Map<String, Value>, key: &str) -> bool {
    str_param(params, key).is_none_or(|s| s.trim().is_empty())
}

fn http_request(node: &Node, out: &mut Vec<Finding>) {
    let params = &node.parameters;

    if blank(params, "url") {
        out.push(
            Finding::error(
                "N001",
                Category::Schema,
                Tier::Essential,
                "HTTP Request URL must not be empty",
            )
            .node(&node.id, &node.name)
            .property("url"),
        );
    } else if let Some(url) = params
        .get("url")
        .filter(|v| !is_expression(v))
        .and_then(Value::as_str)
    {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            out.push(
                Finding::error(
                    "N001",
                    Category::Schema,
                    Tier::Runtime,
                    format!("URL '{}' must start with http:// or https://", url),
                )
                .node(&node.id, &node.name)
                .property("url"),
            );
        }
    }

    let method = str_param(params, "method").unwrap_or("GET");
    if !method.starts_with('=') && !HTTP_METHODS.contains(&method) {
        out.push(
            Finding::error(
                "N001",
                Category::Schema,
                Tier::Runtime,
                format!("Invalid HTTP method '{}'", method),
            )
            .node(&node.id, &node.name)
            .property("method")
            .fix(format!("Use one of: {}", HTTP_METHODS.join(", "))),
        );
    }

    if method == "GET" && params.get("sendBody") == Some(&Value::Bool(true)) {
        out.push(
            Finding::warning(
                "N001",
                Category::Schema,
                Tier::Standard,
                "GET request is configured to send a body; most servers ignore it",
            )
            .node(&node.id, &node.name)
            .property("sendBody"),
        );
    }

    if node.on_error.is_none() {
        out.push(
            Finding::warning(
                "N001",
                Category::Schema,
                Tier::Strict,
                "HTTP Request has no error handling; consider setting onError",
            )
            .node(&node.id, &node.name)
            .fix("Set onError to 'continueRegularOutput' or 'continueErrorOutput'"),
        );
    }
}

fn webhook(node: &Node, out: &mut Vec<Finding>) {
    let params = &node.parameters;
    if blank(params, "path") {
        out.push(
            Finding::error(
                "N002",
                Category::Schema,
                Tier::Essential,
                "Webhook path must not be empty",
            )
            .node(&node.id, &node.name)
            .property("path"),
        );
    } else if str_param(params, "path").is_some_and(|p| p.starts_with('/')) {
        out.push(
            Finding::warning(
                "N002",
                Category::Schema,
                Tier::Standard,
                "Webhook path should not start with '/'",
            )
            .node(&node.id, &node.name)
            .property("path"),
        );
    }
}

fn code(node: &Node, out: &mut Vec<Finding>) {
    let params = &node.parameters;
    let key = match str_param(params, "language") {
        Some(lang) if lang.starts_with("python") => "pythonCode",
        _ => "jsCode",
    };

    match str_param(params, key).map(str::trim) {
        None | Some("") => out.push(
            Finding::error(
                "N003",
                Category::Schema,
                Tier::Essential,
                "Code node must have non-empty code",
            )
            .node(&node.id, &node.name)
            .property(key),
        ),
        Some(source) if !source.contains("return") => out.push(
            Finding::warning(
                "N003",
                Category::Schema,
                Tier::Standard,
                "Code does not contain a return statement; the node will output no items",
            )
            .node(&node.id, &node.name)
            .property(key),
        ),
        Some(_) => {}
    }
}

fn set(node: &Node, out: &mut Vec<Finding>) {
    let params = &node.parameters;
    if str_param(params, "mode") != Some("raw") {
        return;
    }
    let Some(raw) = params
        .get("jsonOutput")
        .filter(|v| !is_expression(v))
        .and_then(Value::as_str)
    else {
        return;
    };
    if let Err(e) = serde_json::from_str::<Value>(raw) {
        out.push(
            Finding::error(
                "N004",
                Category::Schema,
                Tier::Runtime,
                format!("jsonOutput is not valid JSON: {}", e),
            )
            .node(&node.id, &node.name)
            .property("jsonOutput"),
        );
    }
}

fn switch(node: &Node, out: &mut Vec<Finding>) {
    let params = &node.parameters;
    if str_param(params, "mode").is_some_and(|m| m == "expression") {
        return;
    }
    let has_rules = params
        .get("rules")
        .and_then(|r| r.get("values"))
        .and_then(Value::as_array)
        .is_some_and(|v| !v.is_empty());
    let misplaced = params.get("rules").and_then(|r| r.get("conditions")).is_some();
    if !has_rules && !misplaced {
        out.push(
            Finding::warning(
                "N005",
                Category::Schema,
                Tier::Standard,
                "Switch node has no routing rules",
            )
            .node(&node.id, &node.name)
            .property("rules"),
        );
    }
}

fn conditions(node: &Node, out: &mut Vec<Finding>) {
    let empty = match node.parameters.get("conditions") {
        None | Some(Value::Null) => true,
        Some(Value::Object(map)) => map
            .get("conditions")
            .and_then(Value::as_array)
            .is_some_and(Vec::is_empty),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    };
    if empty {
        out.push(
            Finding::error(
                "N006",
                Category::Schema,
                Tier::Essential,
                format!("{} node must have at least one condition", node.kind()),
            )
            .node(&node.id, &node.name)
            .property("conditions"),
        );
    }
}

fn wait(node: &Node, out: &mut Vec<Finding>) {
    if let Some(amount) = node.parameters.get("amount").and_then(Value::as_f64) {
        if amount < 0.0 {
            out.push(
                Finding::error(
                    "N007",
                    Category::Schema,
                    Tier::Runtime,
                    "Wait amount must not be negative",
                )
                .node(&node.id, &node.name)
                .property("amount"),
            );
        }
    }
}

fn merge(node: &Node, out: &mut Vec<Finding>) {
    let Some(mode) = str_param(&node.parameters, "mode") else {
        return;
    };
    if !mode.starts_with('=') && !MERGE_MODES.contains(&mode) {
        out.push(
            Finding::error(
                "N008",
                Category::Schema,
                Tier::Runtime,
                format!("Unknown merge mode '{}'", mode),
            )
            .node(&node.id, &node.name)
            .property("mode")
            .fix(format!("Use one of: {}", MERGE_MODES.join(", "))),
        );
    }
}

fn schedule_trigger(node: &Node, out: &mut Vec<Finding>) {
    let has_interval = node
        .parameters
        .get("rule")
        .and_then(|r| r.get("interval"))
        .and_then(Value::as_array)
        .is_some_and(|v| !v.is_empty());
    if !has_interval {
        out.push(
            Finding::error(
                "N009",
                Category::Schema,
                Tier::Essential,
                "Schedule trigger needs at least one interval rule",
            )
            .node(&node.id, &node.name)
            .property("rule.interval"),
        );
    }
}
