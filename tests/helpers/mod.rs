use flowguard::parse::types::{Endpoint, Node, OnErrorPolicy, Ports, Workflow};
use flowguard::registry::{NodeTypeInfo, StaticRegistry};
use flowguard::validate::ValidationReport;
use serde_json::{Value, json};

// =============================================================================
// Workflow builders
// =============================================================================

pub fn node(name: &str, node_type: &str) -> Node {
    node_with(name, node_type, json!({}))
}

pub fn node_with(name: &str, node_type: &str, parameters: Value) -> Node {
    serde_json::from_value(json!({
        "id": format!("id-{}", name.to_lowercase().replace(' ', "-")),
        "name": name,
        "type": node_type,
        "typeVersion": 1,
        "position": [0, 0],
        "parameters": parameters,
    }))
    .expect("valid node")
}

pub fn with_on_error(mut node: Node, policy: OnErrorPolicy) -> Node {
    node.on_error = Some(policy);
    node
}

pub fn workflow(nodes: Vec<Node>) -> Workflow {
    Workflow {
        id: Some("wf-1".into()),
        name: "Test Workflow".into(),
        nodes,
        ..Default::default()
    }
}

/// Connect `from` output `port` (main) to `to` input 0.
pub fn connect(wf: &mut Workflow, from: &str, port: usize, to: &str) {
    let ports: &mut Ports = wf
        .connections
        .entry(from.to_string())
        .or_default()
        .entry("main".to_string())
        .or_default();
    while ports.len() <= port {
        ports.push(Vec::new());
    }
    ports[port].push(Endpoint::main(to));
}

/// Linear chain `names[0] -> names[1] -> ...` on port 0.
pub fn chain(wf: &mut Workflow, names: &[&str]) {
    for pair in names.windows(2) {
        connect(wf, pair[0], 0, pair[1]);
    }
}

/// Trigger -> HTTP -> Set, all known to [`registry`].
pub fn simple_workflow() -> Workflow {
    let mut wf = workflow(vec![
        node("Start", "pkg.manualTrigger"),
        node_with(
            "Fetch",
            "pkg.httpRequest",
            json!({ "url": "https://example.com/api", "method": "GET" }),
        ),
        node_with("Shape", "pkg.set", json!({ "mode": "manual" })),
    ]);
    chain(&mut wf, &["Start", "Fetch", "Shape"]);
    wf
}

// =============================================================================
// Registry
// =============================================================================

pub fn registry() -> StaticRegistry {
    let types: Vec<NodeTypeInfo> = serde_json::from_value(json!([
        { "type": "pkg.manualTrigger", "displayName": "Manual Trigger", "isTrigger": true },
        { "type": "pkg.webhook", "displayName": "Webhook", "isTrigger": true, "versions": [1, 2],
          "properties": [ { "name": "path", "type": "string", "required": true } ] },
        { "type": "pkg.httpRequest", "displayName": "HTTP Request", "versions": [1],
          "properties": [
            { "name": "url", "displayName": "URL", "type": "string", "required": true },
            { "name": "method", "type": "options", "default": "GET",
              "options": [ { "name": "GET", "value": "GET" },
                           { "name": "POST", "value": "POST" } ] },
            { "name": "body", "type": "json", "required": true,
              "displayOptions": { "show": { "method": ["POST"] } } },
            { "name": "timeout", "type": "number" }
          ] },
        { "type": "pkg.set", "displayName": "Edit Fields", "versions": [1],
          "properties": [
            { "name": "mode", "type": "options", "default": "manual",
              "options": [ { "name": "Manual", "value": "manual" },
                           { "name": "Raw", "value": "raw" } ] },
            { "name": "fields", "type": "fixedCollection" },
            { "name": "jsonOutput", "type": "json",
              "displayOptions": { "show": { "mode": ["raw"] } } }
          ] },
        { "type": "pkg.switch", "displayName": "Switch", "versions": [1],
          "properties": [ { "name": "rules", "type": "fixedCollection" } ] },
        { "type": "pkg.if", "displayName": "If", "versions": [1],
          "properties": [ { "name": "conditions", "type": "fixedCollection" } ] },
        { "type": "pkg.code", "displayName": "Code", "versions": [1],
          "properties": [ { "name": "jsCode", "type": "string" } ] },
        { "type": "pkg.stopAndError", "displayName": "Stop and Error", "versions": [1] },
        { "type": "pkg.noOp", "displayName": "No Operation", "versions": [1] }
    ]))
    .expect("valid registry");
    types.into_iter().collect()
}

// =============================================================================
// Report assertions
// =============================================================================

pub fn count_code(report: &ValidationReport, code: &str) -> usize {
    report
        .errors
        .iter()
        .chain(&report.warnings)
        .filter(|i| i.code == code)
        .count()
}

pub fn assert_has_error(report: &ValidationReport, code: &str) {
    assert!(
        report.errors.iter().any(|e| e.code == code),
        "Expected error {}, got errors: {:?}",
        code,
        report.errors
    );
}

pub fn assert_has_warning(report: &ValidationReport, code: &str) {
    assert!(
        report.warnings.iter().any(|w| w.code == code),
        "Expected warning {}, got warnings: {:?}",
        code,
        report.warnings
    );
}

pub fn assert_no_code(report: &ValidationReport, code: &str) {
    assert_eq!(
        count_code(report, code),
        0,
        "Did not expect {}, got: {:?} / {:?}",
        code,
        report.errors,
        report.warnings
    );
}
