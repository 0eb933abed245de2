//! Reference vocabulary recognised inside `{{ ... }}` bodies.

use std::sync::OnceLock;

use regex_lite::Regex;

/// Accessors the host expression language defines, without the `$` sigil.
pub const KNOWN_VARIABLES: &[&str] = &[
    "json",
    "binary",
    "node",
    "input",
    "items",
    "parameter",
    "env",
    "vars",
    "secrets",
    "workflow",
    "execution",
    "prevNode",
    "itemIndex",
    "runIndex",
    "now",
    "today",
    "jmespath",
    "fromAI",
];

/// Accessors that are commonly written without their sigil by mistake.
const PREFIX_CANDIDATES: &str = "json|node|input|items|parameter|env|workflow|execution";

fn variable_regex() -> &'static Regex {
    static VARIABLE: OnceLock<Regex> = OnceLock::new();
    VARIABLE.get_or_init(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex"))
}

fn node_bracket_regex() -> &'static Regex {
    static NODE_BRACKET: OnceLock<Regex> = OnceLock::new();
    NODE_BRACKET.get_or_init(|| {
        Regex::new(r#"\$node\[\s*(?:"([^"]+)"|'([^']+)')\s*\]"#).expect("valid regex")
    })
}

fn node_dot_regex() -> &'static Regex {
    static NODE_DOT: OnceLock<Regex> = OnceLock::new();
    NODE_DOT.get_or_init(|| Regex::new(r"\$node\.([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex"))
}

fn node_call_regex() -> &'static Regex {
    static NODE_CALL: OnceLock<Regex> = OnceLock::new();
    NODE_CALL.get_or_init(|| {
        Regex::new(r#"\$(?:items)?\(\s*(?:"([^"]+)"|'([^']+)')"#).expect("valid regex")
    })
}

fn missing_prefix_regex() -> &'static Regex {
    static MISSING_PREFIX: OnceLock<Regex> = OnceLock::new();
    MISSING_PREFIX.get_or_init(|| {
        Regex::new(&format!(r"(?:^|[^$\w.])({})\s*[.\[(]", PREFIX_CANDIDATES)).expect("valid regex")
    })
}

/// `$name` accessors used in an expression body, including unknown ones.
pub fn variables(body: &str) -> Vec<String> {
    variable_regex()
        .captures_iter(body)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Node names referenced through `$node["X"]`, `$node.X`, `$("X")` or `$items("X")`.
pub fn node_names(body: &str) -> Vec<String> {
    let mut names = Vec::new();
    for re in [node_bracket_regex(), node_call_regex()] {
        for caps in re.captures_iter(body) {
            if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
                names.push(m.as_str().to_string());
            }
        }
    }
    for caps in node_dot_regex().captures_iter(body) {
        if let Some(m) = caps.get(1) {
            names.push(m.as_str().to_string());
        }
    }
    names
}

/// Bare accessor names that look like they lost their `$`.
pub fn missing_prefixes(body: &str) -> Vec<String> {
    let stripped = strip_string_literals(body);
    missing_prefix_regex()
        .captures_iter(&stripped)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Replace the contents of quoted literals with spaces so heuristics do not
/// fire on text the user meant literally.
fn strip_string_literals(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in body.chars() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                    out.push(' ');
                } else if c == '\\' {
                    escaped = true;
                    out.push(' ');
                } else if c == q {
                    quote = None;
                    out.push(c);
                } else {
                    out.push(' ');
                }
            }
            None => {
                if matches!(c, '"' | '\'' | '`') {
                    quote = Some(c);
                }
                out.push(c);
            }
        }
    }
    out
}
