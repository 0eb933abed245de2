//! Reshaping of known-bad structures into their canonical form.
//!
//! Every strategy is a pure function of its input: it works on the caller's
//! copy and never consults anything but the offending value.

use serde_json::{Value, json};

use super::table::{AutofixStrategy, StructuralPattern};
use crate::path;

/// Apply `pattern`'s strategy for the matched `offending_path` to `config`.
pub fn apply(pattern: &StructuralPattern, offending_path: &str, config: &mut Value) {
    match pattern.autofix_strategy {
        AutofixStrategy::SwitchRules => fix_switch_rules(config),
        AutofixStrategy::FilterConditions => fix_filter_conditions(config, &pattern.property_path),
        AutofixStrategy::FlattenCollection => flatten_collection(config, offending_path),
    }
}

fn into_array(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

fn fix_switch_rules(config: &mut Value) {
    let Some(rules) = config.get_mut("rules").and_then(Value::as_object_mut) else {
        return;
    };
    let Some(conditions) = rules.remove("conditions") else {
        return;
    };

    // `rules.conditions.values` holds one entry per branch; a bare
    // `rules.conditions` object is a single branch.
    let branches = match conditions {
        Value::Object(mut inner) if inner.contains_key("values") => {
            into_array(inner.remove("values").unwrap_or(Value::Null))
        }
        other => vec![other],
    };

    let mut values = rules
        .remove("values")
        .map(into_array)
        .unwrap_or_default();
    let offset = values.len();
    values.extend(branches.into_iter().enumerate().map(|(i, branch)| {
        json!({
            "conditions": branch,
            "outputKey": format!("output{}", offset + i + 1),
        })
    }));
    rules.insert("values".to_string(), Value::Array(values));
}

fn fix_filter_conditions(config: &mut Value, property: &str) {
    let Some(conditions) = config.get_mut(property).and_then(Value::as_object_mut) else {
        return;
    };
    let Some(values) = conditions.remove("values") else {
        return;
    };

    let mut list = conditions
        .remove("conditions")
        .map(into_array)
        .unwrap_or_default();
    list.extend(into_array(values));
    conditions.insert("conditions".to_string(), Value::Array(list));
    conditions
        .entry("combinator".to_string())
        .or_insert_with(|| Value::String("and".to_string()));
}

fn flatten_collection(config: &mut Value, offending_path: &str) {
    let Some((parent, _)) = offending_path.rsplit_once('.') else {
        return;
    };
    let Some(inner) = path::get(config, offending_path).cloned() else {
        return;
    };
    // The parent resolved while matching, so this cannot fail.
    let _ = path::set(config, parent, Value::Array(into_array(inner)));
}
