//! Structural pattern detection and autofix round-trips.

use flowguard::pattern::{PatternCache, StructuralValidator};
use serde_json::{Value, json};

/// One known-invalid configuration per built-in node family.
fn invalid_configs() -> Vec<(&'static str, Value)> {
    vec![
        (
            "pkg.switch",
            json!({ "rules": { "conditions": {
                "values": [{ "value1": "a" }, { "value1": "b" }]
            } } }),
        ),
        ("pkg.switch", json!({ "rules": { "conditions": { "string": [{ "value1": "a" }] } } })),
        (
            "pkg.if",
            json!({ "conditions": { "values": [{ "leftValue": "x", "operator": "equals" }] } }),
        ),
        ("pkg.filter", json!({ "conditions": { "values": { "leftValue": "x" } } })),
        (
            "pkg.summarize",
            json!({ "fieldsToSummarize": { "values": { "values": [{ "field": "n" }] } } }),
        ),
        (
            "pkg.aggregate",
            json!({ "fieldsToAggregate": {
                "fieldToAggregate": { "values": [{ "fieldToAggregate": "n" }] }
            } }),
        ),
        (
            "pkg.compareDatasets",
            json!({ "mergeByFields": {
                "values": { "values": [{ "field1": "a", "field2": "b" }] }
            } }),
        ),
        (
            "pkg.sort",
            json!({ "sortFieldsUi": { "sortField": { "values": [{ "fieldName": "n" }] } } }),
        ),
        (
            "pkg.set",
            json!({ "fields": { "values": { "values": [{ "name": "a", "stringValue": "b" }] } } }),
        ),
        (
            "pkg.html",
            json!({ "extractionValues": {
                "values": { "values": [{ "key": "t", "cssSelector": "h1" }] }
            } }),
        ),
        (
            "pkg.htmlExtract",
            json!({ "extractionValues": { "values": { "values": { "key": "t" } } } }),
        ),
        (
            "pkg.httpRequest",
            json!({ "body": { "parameters": { "values": [{ "name": "a", "value": "1" }] } } }),
        ),
        ("pkg.airtable", json!({ "sort": { "sortField": { "values": [{ "field": "a" }] } } })),
    ]
}

#[test]
fn every_family_round_trips_through_autofix() {
    let validator = StructuralValidator::new();
    for (node_type, config) in invalid_configs() {
        let result = validator.validate(node_type, &config);
        assert!(!result.is_valid, "{} should be flagged: {}", node_type, config);
        let fixed = result.autofix.expect("autofix present when invalid");

        let again = validator.validate(node_type, &fixed);
        assert!(
            again.is_valid,
            "{} autofix still invalid: {} -> {:?}",
            node_type, fixed, again.errors
        );

        // Pure: the same input always produces the same fix.
        assert_eq!(validator.validate(node_type, &config).autofix, Some(fixed));
    }
}

#[test]
fn switch_conditions_values_reshape() {
    let validator = StructuralValidator::new();
    let config = json!({
        "rules": { "conditions": { "values": [{ "value1": "={{ $json.kind }}", "value2": "a" }] } }
    });
    let result = validator.validate("PackageA.Switch", &config);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].pattern, "rules.conditions.values");
    assert_eq!(
        result.autofix,
        Some(json!({
            "rules": { "values": [{
                "conditions": { "value1": "={{ $json.kind }}", "value2": "a" },
                "outputKey": "output1"
            }] }
        }))
    );
}

#[test]
fn switch_fix_appends_after_existing_rules() {
    let validator = StructuralValidator::new();
    let config = json!({
        "rules": {
            "values": [{ "conditions": {}, "outputKey": "output1" }],
            "conditions": { "values": [{ "value1": "b" }] }
        }
    });
    let fixed = validator.validate("switch", &config).autofix.unwrap();
    assert_eq!(fixed["rules"]["values"][1]["outputKey"], "output2");
}

#[test]
fn filter_fix_keeps_existing_combinator() {
    let validator = StructuralValidator::new();
    let config = json!({ "conditions": { "combinator": "or", "values": [{ "leftValue": "x" }] } });
    let fixed = validator.validate("filter", &config).autofix.unwrap();
    assert_eq!(
        fixed,
        json!({ "conditions": { "combinator": "or", "conditions": [{ "leftValue": "x" }] } })
    );
}

#[test]
fn type_matching_ignores_namespace_and_case() {
    let validator = StructuralValidator::new();
    let config = json!({ "rules": { "conditions": {} } });
    for node_type in ["PackageA.switch", "switch", "SWITCH", "@scope/pkg.nodes.Switch"] {
        assert!(!validator.validate(node_type, &config).is_valid, "{}", node_type);
    }
}

#[test]
fn canonical_shapes_are_valid() {
    let validator = StructuralValidator::new();
    assert!(validator
        .validate("set", &json!({ "fields": { "values": [{ "name": "a" }] } }))
        .is_valid);
    assert!(validator
        .validate("if", &json!({ "conditions": { "combinator": "and", "conditions": [] } }))
        .is_valid);
}

#[test]
fn self_similar_deep_config_terminates() {
    // Deep accidental nesting: traversal is bounded by path length, not identity.
    let mut config = json!({ "leaf": true });
    for _ in 0..500 {
        config = json!({ "rules": config, "conditions": { "values": null } });
    }
    let validator = StructuralValidator::new();
    let result = validator.validate("switch", &config);
    assert!(!result.is_valid);
}

#[test]
fn cache_never_changes_the_verdict() {
    let validator = StructuralValidator::new();
    let cache = PatternCache::with_config(4, 1);
    for (node_type, config) in invalid_configs() {
        assert_eq!(
            validator.validate(node_type, &config),
            validator.validate_cached(&cache, node_type, &config)
        );
    }
}
