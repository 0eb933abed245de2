//! Schema checks against registry metadata: node-type existence, typeVersion
//! bounds, and visibility-aware property validation.

use serde_json::{Map, Value};

use super::report::{Finding, Tier, ValidationMode};
use crate::error::Category;
use crate::parse::types::Node;
use crate::registry::{DisplayOptions, NodeTypeInfo, PropertyDef, PropertyKind};

/// Prefixes an older catalogue format used. They look plausible but never
/// name a real node type, so they are rejected before any lookup.
const LEGACY_PREFIXES: &[(&str, &str)] = &[
    ("nodes-base.", "n8n-nodes-base."),
    ("nodes-langchain.", "@n8n/n8n-nodes-langchain."),
];

/// Syntactic check of a node type string, run before the registry is consulted.
pub fn check_type_format(node_type: &str) -> Option<Finding> {
    let trimmed = node_type.trim();
    if trimmed.is_empty() {
        return Some(
            Finding::error("C011", Category::Schema, Tier::Critical, "Node type is empty")
                .fix("Set 'type' to a namespaced identifier such as '<package>.<kind>'"),
        );
    }

    for (legacy, current) in LEGACY_PREFIXES {
        if let Some(rest) = trimmed.strip_prefix(legacy) {
            return Some(
                Finding::error(
                    "C012",
                    Category::Schema,
                    Tier::Critical,
                    format!(
                        "Invalid node type '{}': legacy prefix '{}' is not accepted",
                        trimmed, legacy
                    ),
                )
                .fix(format!("Use '{}{}' instead", current, rest)),
            );
        }
    }

    let Some((package, kind)) = trimmed.rsplit_once('.') else {
        return Some(
            Finding::error(
                "C011",
                Category::Schema,
                Tier::Critical,
                format!("Node type '{}' is missing its package prefix", trimmed),
            )
            .fix("Use the full '<package>.<kind>' identifier"),
        );
    };
    if package.is_empty() || kind.is_empty() || trimmed != node_type {
        return Some(
            Finding::error(
                "C011",
                Category::Schema,
                Tier::Critical,
                format!("Node type '{}' is malformed", node_type),
            )
            .fix("Use the full '<package>.<kind>' identifier without surrounding whitespace"),
        );
    }
    None
}

pub fn unknown_type(node: &Node, suggestions: &[String]) -> Finding {
    let finding = Finding::error(
        "C010",
        Category::Schema,
        Tier::Critical,
        format!("Unknown node type: '{}'", node.node_type),
    )
    .node(&node.id, &node.name)
    .property("type");
    match suggestions {
        [] => finding.fix("Check the node type against the node catalogue"),
        [only] => finding.fix(format!("Did you mean '{}'?", only)),
        many => finding.fix(format!("Did you mean one of: {}?", many.join(", "))),
    }
}

pub fn check_version(node: &Node, info: &NodeTypeInfo, out: &mut Vec<Finding>) {
    let Some(latest) = info.latest_version() else {
        return;
    };

    let Some(version) = node.type_version else {
        out.push(
            Finding::error(
                "R001",
                Category::Version,
                Tier::Essential,
                format!("Missing required property 'typeVersion'. Use version {}", latest),
            )
            .node(&node.id, &node.name)
            .property("typeVersion")
            .fix(format!("Add \"typeVersion\": {}", latest)),
        );
        return;
    };

    if !version.is_finite() || version <= 0.0 {
        out.push(
            Finding::error(
                "R004",
                Category::Version,
                Tier::Essential,
                format!("Invalid typeVersion {}: must be a positive number", version),
            )
            .node(&node.id, &node.name)
            .property("typeVersion"),
        );
    } else if version > latest {
        out.push(
            Finding::error(
                "R003",
                Category::Version,
                Tier::Essential,
                format!(
                    "typeVersion {} exceeds maximum supported version {}",
                    version, latest
                ),
            )
            .node(&node.id, &node.name)
            .property("typeVersion")
            .fix(format!("Set typeVersion to {}", latest)),
        );
    } else if version < latest {
        out.push(
            Finding::warning(
                "R002",
                Category::Version,
                Tier::Standard,
                format!("Outdated typeVersion: {}. Latest is {}", version, latest),
            )
            .node(&node.id, &node.name)
            .property("typeVersion"),
        );
    }
}

/// Effective value of a sibling parameter: the configured value or the
/// schema default.
fn sibling_value<'a>(
    name: &str,
    params: &'a Map<String, Value>,
    info: &'a NodeTypeInfo,
) -> Option<&'a Value> {
    params
        .get(name)
        .or_else(|| info.property(name).and_then(|p| p.default.as_ref()))
}

fn condition_holds(
    key: &str,
    allowed: &[Value],
    params: &Map<String, Value>,
    info: &NodeTypeInfo,
    type_version: Option<f64>,
) -> bool {
    if key == "@version" {
        let Some(version) = type_version else {
            return false;
        };
        return allowed.iter().any(|v| v.as_f64() == Some(version));
    }
    match sibling_value(key, params, info) {
        Some(Value::Array(values)) => values.iter().any(|v| allowed.contains(v)),
        Some(value) => allowed.contains(value),
        None => false,
    }
}

/// A property is visible when every `show` rule matches and no `hide` rule does.
pub fn is_visible(
    prop: &PropertyDef,
    params: &Map<String, Value>,
    info: &NodeTypeInfo,
    type_version: Option<f64>,
) -> bool {
    let Some(DisplayOptions { show, hide }) = &prop.display_options else {
        return true;
    };
    let shown = show
        .iter()
        .all(|(key, allowed)| condition_holds(key, allowed, params, info, type_version));
    let hidden = hide
        .iter()
        .any(|(key, allowed)| condition_holds(key, allowed, params, info, type_version));
    shown && !hidden
}

fn is_operation_scoped(prop: &PropertyDef) -> bool {
    prop.display_options
        .as_ref()
        .is_some_and(|d| d.show.contains_key("operation") || d.show.contains_key("resource"))
}

pub fn is_expression(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| s.starts_with('=') || s.contains("{{"))
}

fn kind_matches(kind: PropertyKind, value: &Value) -> bool {
    match kind {
        PropertyKind::String => value.is_string(),
        PropertyKind::Number => value.is_number(),
        PropertyKind::Boolean => value.is_boolean(),
        PropertyKind::MultiOptions => value.is_array(),
        PropertyKind::Collection | PropertyKind::FixedCollection => value.is_object(),
        PropertyKind::Json => value.is_string() || value.is_object() || value.is_array(),
        PropertyKind::Options | PropertyKind::Notice | PropertyKind::Other => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn allowed_values(prop: &PropertyDef) -> Vec<&Value> {
    prop.options.iter().filter_map(|o| o.value.as_ref()).collect()
}

fn render_allowed(allowed: &[&Value]) -> String {
    allowed
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check parameters against the node type's property schema.
pub fn check_properties(
    node: &Node,
    info: &NodeTypeInfo,
    mode: ValidationMode,
    out: &mut Vec<Finding>,
) {
    let params = &node.parameters;
    let mut reported_missing: Vec<&str> = Vec::new();

    for prop in &info.properties {
        if prop.kind == PropertyKind::Notice {
            continue;
        }
        if !is_visible(prop, params, info, node.type_version) {
            continue;
        }
        if mode == ValidationMode::Operation && !prop.required && !is_operation_scoped(prop) {
            continue;
        }

        let value = params.get(&prop.name).filter(|v| !v.is_null());
        let Some(value) = value else {
            let unreported = !reported_missing.contains(&prop.name.as_str());
            if prop.required && prop.default.is_none() && unreported {
                reported_missing.push(&prop.name);
                let label = if prop.display_name.is_empty() {
                    &prop.name
                } else {
                    &prop.display_name
                };
                out.push(
                    Finding::error(
                        "C001",
                        Category::Schema,
                        Tier::Essential,
                        format!("Required property '{}' is missing", label),
                    )
                    .node(&node.id, &node.name)
                    .property(&prop.name)
                    .fix(format!("Add '{}' to parameters", prop.name)),
                );
            }
            continue;
        };

        if mode == ValidationMode::Minimal || is_expression(value) {
            continue;
        }

        if !kind_matches(prop.kind, value) {
            out.push(
                Finding::error(
                    "C002",
                    Category::Schema,
                    Tier::Runtime,
                    format!(
                        "Property '{}' must be of type {:?}, got {}",
                        prop.name,
                        prop.kind,
                        json_type_name(value)
                    ),
                )
                .node(&node.id, &node.name)
                .property(&prop.name),
            );
            continue;
        }

        let allowed = allowed_values(prop);
        if allowed.is_empty() {
            continue;
        }
        let invalid: Vec<&Value> = match (prop.kind, value) {
            (PropertyKind::Options, v) => {
                vec![v].into_iter().filter(|v| !allowed.contains(v)).collect()
            }
            (PropertyKind::MultiOptions, Value::Array(items)) => {
                items.iter().filter(|v| !allowed.contains(v) && !is_expression(v)).collect()
            }
            _ => vec![],
        };
        for bad in invalid {
            out.push(
                Finding::error(
                    "C003",
                    Category::Schema,
                    Tier::Runtime,
                    format!("Invalid value {} for property '{}'", bad, prop.name),
                )
                .node(&node.id, &node.name)
                .property(&prop.name)
                .fix(format!("Valid options: {}", render_allowed(&allowed))),
            );
        }
    }

    if mode != ValidationMode::Full {
        return;
    }

    for (key, value) in params {
        let defs: Vec<&PropertyDef> = info.properties.iter().filter(|p| &p.name == key).collect();
        if defs.is_empty() {
            out.push(
                Finding::warning(
                    "C004",
                    Category::Schema,
                    Tier::Strict,
                    format!("Unknown property '{}' is not part of the node's schema", key),
                )
                .node(&node.id, &node.name)
                .property(key),
            );
        } else if !value.is_null()
            && !defs.iter().any(|p| is_visible(p, params, info, node.type_version))
        {
            out.push(
                Finding::warning(
                    "C005",
                    Category::Schema,
                    Tier::Strict,
                    format!(
                        "Property '{}' is set but not visible with the current \
                         configuration and will be ignored",
                        key
                    ),
                )
                .node(&node.id, &node.name)
                .property(key),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_prefix_rejected_before_lookup() {
        let f = check_type_format("nodes-base.httpRequest").unwrap();
        assert_eq!(f.issue.code, "C012");
        assert_eq!(f.issue.fix.as_deref(), Some("Use 'n8n-nodes-base.httpRequest' instead"));
        assert!(check_type_format("pkg.httpRequest").is_none());
        assert_eq!(check_type_format("httpRequest").unwrap().issue.code, "C011");
        assert_eq!(check_type_format(" pkg.set").unwrap().issue.code, "C011");
    }

    #[test]
    fn visibility_follows_show_and_hide() {
        let info: NodeTypeInfo = serde_json::from_value(json!({
            "type": "pkg.http",
            "properties": [
                { "name": "method", "type": "options", "default": "GET",
                  "options": [{ "name": "GET", "value": "GET" },
                              { "name": "POST", "value": "POST" }] },
                { "name": "body", "type": "json", "required": true,
                  "displayOptions": { "show": { "method": ["POST"] } } },
                { "name": "legacy", "type": "string",
                  "displayOptions": { "hide": { "@version": [2] } } }
            ]
        }))
        .unwrap();
        let body = info.property("body").unwrap();
        let legacy = info.property("legacy").unwrap();

        let get = Map::new();
        assert!(!is_visible(body, &get, &info, Some(2.0)));

        let mut post = Map::new();
        post.insert("method".into(), json!("POST"));
        assert!(is_visible(body, &post, &info, Some(2.0)));

        assert!(!is_visible(legacy, &get, &info, Some(2.0)));
        assert!(is_visible(legacy, &get, &info, Some(1.0)));
    }
}
