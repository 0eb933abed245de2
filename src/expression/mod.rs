//! Validation of embedded `{{ ... }}` template expressions.
//!
//! Only syntax and references are checked; expressions are never evaluated.

pub mod references;

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use references::KNOWN_VARIABLES;

/// Parameter trees nested deeper than this are not scanned further.
const MAX_SCAN_DEPTH: usize = 64;

/// What the validator knows about the node that owns the expression.
#[derive(Debug, Clone, Default)]
pub struct ExpressionContext<'a> {
    /// Names of every node in the workflow. `None` skips the existence check.
    pub available_nodes: Option<&'a BTreeSet<String>>,
    pub current_node: Option<&'a str>,
    /// Whether the node is guaranteed to receive items from a predecessor.
    pub has_input_data: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ExpressionIssue {
    /// Dotted path of the parameter, when scanning a parameter tree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionValidation {
    pub valid: bool,
    pub errors: Vec<ExpressionIssue>,
    pub warnings: Vec<ExpressionIssue>,
    pub used_variables: BTreeSet<String>,
    pub used_nodes: BTreeSet<String>,
    /// Number of strings that contained an expression.
    pub expression_count: usize,
}

impl ExpressionValidation {
    fn new() -> Self {
        ExpressionValidation {
            valid: true,
            ..Default::default()
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(ExpressionIssue {
            path: None,
            message: message.into(),
        });
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(ExpressionIssue {
            path: None,
            message: message.into(),
        });
    }

    fn absorb(&mut self, other: ExpressionValidation, path: &str) {
        let tag = |mut issue: ExpressionIssue| {
            issue.path.get_or_insert_with(|| path.to_string());
            issue
        };
        self.errors.extend(other.errors.into_iter().map(tag));
        self.warnings.extend(other.warnings.into_iter().map(tag));
        self.used_variables.extend(other.used_variables);
        self.used_nodes.extend(other.used_nodes);
        self.expression_count += other.expression_count;
    }

    fn finish(mut self) -> Self {
        dedup(&mut self.errors);
        dedup(&mut self.warnings);
        self.valid = self.errors.is_empty();
        self
    }
}

fn dedup(issues: &mut Vec<ExpressionIssue>) {
    let mut seen = BTreeSet::new();
    issues.retain(|issue| seen.insert(issue.clone()));
}

/// Whether a string value carries at least one template expression.
pub fn contains_expression(text: &str) -> bool {
    text.contains("{{")
}

/// Validate one string that may contain any number of `{{ ... }}` expressions.
pub fn validate_expression(text: &str, ctx: &ExpressionContext<'_>) -> ExpressionValidation {
    let mut result = ExpressionValidation::new();
    if !contains_expression(text) && !text.contains("}}") {
        return result.finish();
    }
    result.expression_count = 1;

    let bodies = match split_bodies(text) {
        Ok(bodies) => bodies,
        Err(message) => {
            result.error(message);
            return result.finish();
        }
    };

    for body in &bodies {
        check_body(body, ctx, &mut result);
    }

    if let Some(available) = ctx.available_nodes {
        for name in &result.used_nodes {
            if !available.contains(name) {
                result.errors.push(ExpressionIssue {
                    path: None,
                    message: format!("Referenced node '{}' not found in workflow", name),
                });
            }
        }
    }

    if let Some(current) = ctx.current_node {
        if result.used_nodes.contains(current) {
            result.warning(format!("Expression references its own node '{}'", current));
        }
    }

    result.finish()
}

/// Recursively validate every expression string in a parameter tree.
/// Findings are tagged with the dotted path of the offending value.
pub fn validate_parameters(
    parameters: &Map<String, Value>,
    ctx: &ExpressionContext<'_>,
) -> ExpressionValidation {
    let mut result = ExpressionValidation::new();
    for (key, value) in parameters {
        scan(value, key, 0, ctx, &mut result);
    }
    result.finish()
}

fn scan(
    value: &Value,
    path: &str,
    depth: usize,
    ctx: &ExpressionContext<'_>,
    result: &mut ExpressionValidation,
) {
    if depth > MAX_SCAN_DEPTH {
        return;
    }
    match value {
        Value::String(s) if contains_expression(s) => {
            result.absorb(validate_expression(s, ctx), path);
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                scan(item, &format!("{}[{}]", path, i), depth + 1, ctx, result);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                scan(item, &format!("{}.{}", path, key), depth + 1, ctx, result);
            }
        }
        _ => {}
    }
}

/// Extract the bodies of all `{{ ... }}` pairs, rejecting nesting and
/// unbalanced delimiters.
fn split_bodies(text: &str) -> Result<Vec<&str>, String> {
    let bytes = text.as_bytes();
    let mut bodies = Vec::new();
    let mut open: Option<usize> = None;
    let mut i = 0;

    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'{', b'{') => {
                if open.is_some() {
                    return Err("Nested expressions are not supported".into());
                }
                open = Some(i + 2);
                i += 2;
            }
            (b'}', b'}') => {
                let Some(start) = open.take() else {
                    return Err("Unmatched closing braces '}}' without opening '{{'".into());
                };
                // Absorb a third brace so `{ a: 1 }}}` closes after the object literal.
                let mut end = i;
                while end + 2 < bytes.len() && bytes[end + 2] == b'}' {
                    end += 1;
                }
                bodies.push(&text[start..end]);
                i = end + 2;
            }
            _ => i += 1,
        }
    }

    if open.is_some() {
        return Err("Unmatched opening braces '{{' without closing '}}'".into());
    }
    Ok(bodies)
}

fn check_body(body: &str, ctx: &ExpressionContext<'_>, result: &mut ExpressionValidation) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        result.error("Empty expression found");
        return;
    }

    if trimmed.contains("${") {
        result.error(
            "Template literal syntax ${...} is not supported inside expressions; \
             use string concatenation instead",
        );
    }
    if trimmed.contains("?.") {
        result.error("Optional chaining (?.) is not supported in expressions");
    }

    for variable in references::variables(trimmed) {
        if KNOWN_VARIABLES.contains(&variable.as_str()) {
            result.used_variables.insert(format!("${}", variable));
        } else {
            result.warning(format!("Unknown expression variable '${}'", variable));
        }
    }
    if trimmed.contains("$(") {
        result.used_variables.insert("$()".to_string());
    }
    result.used_nodes.extend(references::node_names(trimmed));

    for bare in references::missing_prefixes(trimmed) {
        result.warning(format!(
            "Possible missing $ prefix: '{}' should probably be '${}'",
            bare, bare
        ));
    }

    if !ctx.has_input_data {
        if result.used_variables.contains("$json") {
            result.warning("Using $json but node might not have input data");
        }
        if result.used_variables.contains("$input") {
            result.error("$input is only available when the node has input data");
        }
    }
}
