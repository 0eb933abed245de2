//! Single-node validation: schema depth per mode, and how it combines with
//! the per-family rules.

#[allow(dead_code)]
mod helpers;

use flowguard::pattern::PatternCache;
use flowguard::registry::{NodeTypeInfo, StaticRegistry};
use flowguard::validate::{
    NodeRules, Profile, ValidationIssue, ValidationMode, ValidationOptions, ValidationReport,
    WorkflowValidator,
};
use helpers::*;
use serde_json::{Value, json};

/// A resource/operation node: `email` is required for `create`, `limit`
/// only exists for `get`, `fields` is scoped to the `contact` resource.
fn crm_registry() -> StaticRegistry {
    let types: Vec<NodeTypeInfo> = serde_json::from_value(json!([{
        "type": "pkg.crm",
        "displayName": "CRM",
        "properties": [
            { "name": "resource", "type": "options", "default": "contact",
              "options": [ { "name": "Contact", "value": "contact" },
                           { "name": "Deal", "value": "deal" } ] },
            { "name": "operation", "type": "options", "default": "create",
              "options": [ { "name": "Create", "value": "create" },
                           { "name": "Get", "value": "get" } ] },
            { "name": "email", "type": "string", "required": true,
              "displayOptions": { "show": { "operation": ["create"] } } },
            { "name": "limit", "type": "number",
              "displayOptions": { "show": { "operation": ["get"] } } },
            { "name": "fields", "type": "string",
              "displayOptions": { "show": { "resource": ["contact"] } } },
            { "name": "notes", "type": "string" }
        ]
    }]))
    .expect("valid registry");
    types.into_iter().collect()
}

fn crm_config() -> Value {
    json!({
        "resource": "contact",
        "operation": "create",
        "fields": 7,
        "notes": 3,
        "limit": 10,
        "color": "red"
    })
}

fn codes(issues: &[ValidationIssue]) -> Vec<(&str, Option<&str>)> {
    issues.iter().map(|i| (i.code, i.property.as_deref())).collect()
}

fn validate_crm(mode: ValidationMode) -> ValidationReport {
    let registry = crm_registry();
    WorkflowValidator::new(&registry).validate_node(
        "pkg.crm",
        &crm_config(),
        mode,
        Profile::Strict,
    )
}

#[test]
fn minimal_mode_checks_required_properties_only() {
    let report = validate_crm(ValidationMode::Minimal);
    assert_eq!(codes(&report.errors), vec![("C001", Some("email"))]);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
}

#[test]
fn operation_mode_adds_operation_scoped_properties() {
    let report = validate_crm(ValidationMode::Operation);
    assert_eq!(
        codes(&report.errors),
        vec![("C001", Some("email")), ("C002", Some("fields"))]
    );
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
}

#[test]
fn full_mode_checks_everything_visible_and_flags_leftovers() {
    let report = validate_crm(ValidationMode::Full);
    assert_eq!(
        codes(&report.errors),
        vec![
            ("C001", Some("email")),
            ("C002", Some("fields")),
            ("C002", Some("notes")),
        ]
    );
    assert_eq!(
        codes(&report.warnings),
        vec![("C004", Some("color")), ("C005", Some("limit"))]
    );
    assert_eq!(report.statistics.total_nodes, 1);
}

#[test]
fn missing_url_is_reported_once() {
    let registry = registry();
    let validator = WorkflowValidator::new(&registry);
    for mode in [ValidationMode::Minimal, ValidationMode::Operation, ValidationMode::Full] {
        let report = validator.validate_node("pkg.httpRequest", &json!({}), mode, Profile::Strict);
        assert_eq!(codes(&report.errors), vec![("C001", Some("url"))], "{:?}", mode);
        // The remaining rule finding is the missing onError advice.
        assert_eq!(codes(&report.warnings), vec![("N001", None)], "{:?}", mode);
    }

    // POST makes `body` visible, and with it required.
    let report = validator.validate_node(
        "pkg.httpRequest",
        &json!({ "method": "POST" }),
        ValidationMode::Minimal,
        Profile::Strict,
    );
    assert_eq!(
        codes(&report.errors),
        vec![("C001", Some("url")), ("C001", Some("body"))]
    );
}

#[test]
fn node_rules_still_run_when_schema_is_satisfied() {
    let registry = registry();
    let report = WorkflowValidator::new(&registry).validate_node(
        "pkg.httpRequest",
        &json!({ "url": "ftp://example.com" }),
        ValidationMode::Full,
        Profile::AiFriendly,
    );
    assert_eq!(codes(&report.errors), vec![("N001", Some("url"))]);
}

#[test]
fn custom_rule_set_replaces_defaults() {
    let registry = registry();
    let validator = WorkflowValidator::new(&registry).with_node_rules(NodeRules::empty());
    let report = validator.validate_node(
        "pkg.httpRequest",
        &json!({ "url": "ftp://example.com" }),
        ValidationMode::Full,
        Profile::Strict,
    );
    assert!(report.valid, "{:?}", report.errors);
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
}

#[test]
fn non_object_config_is_critical() {
    let registry = registry();
    let report = WorkflowValidator::new(&registry).validate_node(
        "pkg.set",
        &json!("mode=raw"),
        ValidationMode::Minimal,
        Profile::Minimal,
    );
    assert!(!report.valid);
    assert_eq!(codes(&report.errors), vec![("C002", None)]);
}

#[test]
fn unknown_type_and_patterns_apply_to_single_nodes() {
    let registry = registry();
    let validator = WorkflowValidator::new(&registry);
    let report = validator.validate_node(
        "pkg.switch",
        &json!({ "rules": { "conditions": { "values": [{ "value1": "a" }] } } }),
        ValidationMode::Operation,
        Profile::Minimal,
    );
    assert_has_error(&report, "T001");

    let report =
        validator.validate_node("pkg.nope", &json!({}), ValidationMode::Full, Profile::Minimal);
    assert_has_error(&report, "C010");
}

#[test]
fn pattern_cache_does_not_change_the_report() {
    let mut wf = simple_workflow();
    wf.nodes.push(node_with(
        "Route",
        "pkg.switch",
        json!({ "rules": { "conditions": { "values": [{ "value1": "a" }] } } }),
    ));
    connect(&mut wf, "Shape", 0, "Route");

    let registry = registry();
    let cache = PatternCache::default();
    let options = ValidationOptions::default();
    let plain = WorkflowValidator::new(&registry).validate(&wf, &options);
    let cached = WorkflowValidator::new(&registry).with_pattern_cache(&cache);
    assert_eq!(cached.validate(&wf, &options), plain);
    assert_eq!(cached.validate(&wf, &options), plain);
}
