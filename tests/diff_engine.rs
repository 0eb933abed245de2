//! Integration tests for transactional diff application.

#[allow(dead_code)]
mod helpers;

use flowguard::diff::{DiffConfig, DiffEngine, DiffRequest, DiffResult, MAX_PORT_INDEX};
use flowguard::error::RequestError;
use flowguard::parse::Workflow;
use flowguard::validate::{Profile, WorkflowValidator};
use helpers::*;
use serde_json::{Value, json};

fn request(operations: Value) -> DiffRequest {
    serde_json::from_value(json!({ "id": "wf-1", "operations": operations }))
        .expect("valid request")
}

fn apply(wf: &Workflow, operations: Value) -> DiffResult {
    DiffEngine::new(DiffConfig::default())
        .apply(wf, &request(operations))
        .expect("within operation cap")
}

fn applied(wf: &Workflow, operations: Value) -> Workflow {
    let result = apply(wf, operations);
    assert!(result.success, "diff failed: {:?}", result.errors);
    result.workflow.expect("workflow returned on success")
}

fn targets(wf: &Workflow, source: &str, port: usize) -> Vec<String> {
    wf.ports(source, "main")
        .and_then(|p| p.get(port))
        .map(|port| port.iter().map(|e| e.node.clone()).collect())
        .unwrap_or_default()
}

// =============================================================================
// Batch semantics
// =============================================================================

#[test]
fn six_operations_exceed_default_cap() {
    let ops: Vec<Value> = (0..6)
        .map(|i| {
            json!({ "type": "addNode", "node": { "name": format!("N{}", i), "type": "pkg.noOp" } })
        })
        .collect();
    let engine = DiffEngine::new(DiffConfig::default());
    let err = engine.apply(&simple_workflow(), &request(Value::Array(ops))).unwrap_err();
    assert_eq!(err, RequestError::TooManyOperations { count: 6, max: 5 });
    assert_eq!(err.code(), "B001");
}

#[test]
fn cap_is_checked_before_operations_are_parsed() {
    let engine = DiffEngine::new(DiffConfig::default());
    let garbage = r#"{ "operations": [
        {"type":"explode"},{"type":"explode"},{"type":"explode"},
        {"type":"explode"},{"type":"explode"},{"type":"explode"}
    ] }"#;
    let err = engine.apply_json(&simple_workflow(), garbage).unwrap_err();
    assert!(matches!(err, RequestError::TooManyOperations { count: 6, max: 5 }));

    // Under the cap the first bad operation is named.
    let err = engine
        .apply_json(
            &simple_workflow(),
            r#"{ "operations": [ {"type":"addTag","tag":"a"}, {"type":"explode"} ] }"#,
        )
        .unwrap_err();
    assert!(matches!(err, RequestError::MalformedOperation { index: 1, .. }));
}

#[test]
fn cap_is_configurable() {
    let engine = DiffEngine::new(DiffConfig {
        max_operations: 1,
        ..Default::default()
    });
    let ops = json!([{ "type": "addTag", "tag": "a" }, { "type": "addTag", "tag": "b" }]);
    assert!(engine.apply(&simple_workflow(), &request(ops)).is_err());
}

#[test]
fn connection_before_node_matches_node_before_connection() {
    let add_node = json!({ "type": "addNode", "node": { "name": "Notify", "type": "pkg.noOp" } });
    let add_conn = json!({ "type": "addConnection", "source": "Shape", "target": "Notify" });

    let wf = simple_workflow();
    let forward = applied(&wf, json!([add_node.clone(), add_conn.clone()]));
    let backward = applied(&wf, json!([add_conn, add_node]));
    assert_eq!(forward, backward);
    assert_eq!(targets(&forward, "Shape", 0), vec!["Notify"]);
}

#[test]
fn failure_aborts_whole_batch() {
    let wf = simple_workflow();
    let before = wf.clone();
    let result = apply(
        &wf,
        json!([
            { "type": "addTag", "tag": "draft" },
            { "type": "addConnection", "source": "Start", "target": "Ghost" },
            { "type": "addNode", "node": { "name": "Extra", "type": "pkg.noOp" } }
        ]),
    );
    assert!(!result.success);
    assert!(result.workflow.is_none());
    // addNode ran first, then the connection failed.
    assert_eq!(result.operations_applied, 1);
    assert_eq!(result.errors[0].operation, 1);
    assert_eq!(wf, before);
    insta::assert_json_snapshot!("failed_diff_result", result);
}

#[test]
fn validate_only_never_returns_a_workflow() {
    let request: DiffRequest = serde_json::from_value(json!({
        "operations": [ { "type": "updateName", "name": "Renamed" } ],
        "validateOnly": true
    }))
    .unwrap();
    let result = DiffEngine::new(DiffConfig::default())
        .apply(&simple_workflow(), &request)
        .unwrap();
    assert!(result.success);
    assert!(result.workflow.is_none());
    assert_eq!(result.operations_applied, 1);
}

#[test]
fn post_apply_validation_can_refuse_the_result() {
    let registry = registry();
    let validator = WorkflowValidator::new(&registry);
    let engine = DiffEngine::new(DiffConfig {
        validate_after_apply: true,
        profile: Profile::Minimal,
        ..Default::default()
    })
    .with_validator(&validator);

    let bad = request(json!([
        { "type": "addNode", "node": { "name": "Odd", "type": "pkg.unheardOf" } },
        { "type": "addConnection", "source": "Shape", "target": "Odd" }
    ]));
    let result = engine.apply(&simple_workflow(), &bad).unwrap();
    assert!(!result.success);
    assert!(result.workflow.is_none());
    assert!(result.validation.as_ref().unwrap().has_code("C010"));

    let good = request(json!([{ "type": "addTag", "tag": "ok" }]));
    let result = engine.apply(&simple_workflow(), &good).unwrap();
    assert!(result.success);
    assert!(result.validation.unwrap().valid);
}

// =============================================================================
// Node operations
// =============================================================================

#[test]
fn add_node_fills_defaults_and_generates_id() {
    let wf = applied(
        &simple_workflow(),
        json!([{
            "type": "addNode",
            "description": "scratch",
            "node": { "name": "Extra", "type": "pkg.noOp" }
        }]),
    );
    let node = wf.node_by_name("Extra").unwrap();
    assert_eq!(node.id, "node-4");
    assert_eq!(node.type_version, Some(1.0));
    assert_eq!(node.position, [0.0, 0.0]);
    assert!(node.parameters.is_empty());
}

#[test]
fn add_node_rejections() {
    let wf = simple_workflow();
    let cases = [
        (json!({ "name": "", "type": "pkg.noOp" }), "Node name is required"),
        (json!({ "name": "Fetch", "type": "pkg.noOp" }), "already exists"),
        (json!({ "name": "X", "type": "nodes-base.noOp" }), "legacy prefix"),
        (json!({ "name": "X", "type": "noOp" }), "package prefix"),
    ];
    for (node, expected) in cases {
        let result = apply(&wf, json!([{ "type": "addNode", "node": node }]));
        assert!(!result.success);
        assert!(
            result.errors[0].message.contains(expected),
            "expected {:?} in {:?}",
            expected,
            result.errors[0].message
        );
    }
}

#[test]
fn remove_node_drops_its_connections() {
    let wf = applied(&simple_workflow(), json!([{ "type": "removeNode", "nodeName": "Fetch" }]));
    assert!(wf.node_by_name("Fetch").is_none());
    assert!(wf.connections.is_empty(), "{:?}", wf.connections);
}

#[test]
fn id_takes_precedence_over_name() {
    let wf = applied(
        &simple_workflow(),
        json!([{ "type": "disableNode", "nodeId": "id-fetch", "nodeName": "Shape" }]),
    );
    assert!(wf.node_by_name("Fetch").unwrap().disabled);
    assert!(!wf.node_by_name("Shape").unwrap().disabled);
}

#[test]
fn ambiguous_name_is_reported_not_guessed() {
    let mut wf = simple_workflow();
    let mut twin = node("Shape", "pkg.noOp");
    twin.id = "twin".into();
    wf.nodes.push(twin);
    let result = apply(
        &wf,
        json!([{ "type": "moveNode", "nodeName": "Shape", "position": [10, 20] }]),
    );
    assert!(!result.success);
    assert!(result.errors[0].message.contains("ambiguous"));
}

#[test]
fn update_node_rename_rewrites_connections() {
    let wf = applied(
        &simple_workflow(),
        json!([{
            "type": "updateNode",
            "nodeName": "Fetch",
            "updates": { "name": "Download", "parameters.options.timeout": 5000 }
        }]),
    );
    let node = wf.node_by_name("Download").unwrap();
    assert_eq!(node.parameters["options"]["timeout"], 5000);
    assert_eq!(node.parameters["url"], "https://example.com/api");
    assert_eq!(targets(&wf, "Start", 0), vec!["Download"]);
    assert_eq!(targets(&wf, "Download", 0), vec!["Shape"]);
    assert!(wf.connections.get("Fetch").is_none());
}

#[test]
fn update_node_cannot_change_id() {
    let result = apply(
        &simple_workflow(),
        json!([{ "type": "updateNode", "nodeName": "Fetch", "updates": { "id": "new-id" } }]),
    );
    assert!(!result.success);
    assert_eq!(result.errors[0].message, "Cannot change the id of node 'Fetch'");
}

#[test]
fn update_node_type_goes_through_the_same_checks_as_add_node() {
    let result = apply(
        &simple_workflow(),
        json!([{
            "type": "updateNode",
            "nodeName": "Fetch",
            "updates": { "type": "nodes-base.httpRequest" }
        }]),
    );
    assert!(!result.success);
    assert!(result.errors[0].message.contains("legacy prefix"), "{:?}", result.errors);

    let wf = applied(
        &simple_workflow(),
        json!([{ "type": "updateNode", "nodeName": "Fetch", "updates": { "type": "pkg.noOp" } }]),
    );
    assert_eq!(wf.node_by_name("Fetch").unwrap().node_type, "pkg.noOp");
}

#[test]
fn enable_and_move() {
    let mut wf = simple_workflow();
    wf.nodes[2].disabled = true;
    let wf = applied(
        &wf,
        json!([
            { "type": "enableNode", "nodeName": "Shape" },
            { "type": "moveNode", "nodeId": "id-shape", "position": [300, 120] }
        ]),
    );
    let shape = wf.node_by_name("Shape").unwrap();
    assert!(!shape.disabled);
    assert_eq!(shape.position, [300.0, 120.0]);
}

// =============================================================================
// Connection operations
// =============================================================================

#[test]
fn add_connection_by_id_pads_ports() {
    let wf = applied(
        &simple_workflow(),
        json!([{
            "type": "addConnection",
            "source": "id-fetch",
            "target": "Start",
            "sourceIndex": 2
        }]),
    );
    let ports = wf.ports("Fetch", "main").unwrap();
    assert_eq!(ports.len(), 3);
    assert!(ports[1].is_empty());
    assert_eq!(targets(&wf, "Fetch", 2), vec!["Start"]);
}

#[test]
fn duplicate_connection_rejected() {
    let result = apply(
        &simple_workflow(),
        json!([{ "type": "addConnection", "source": "Start", "target": "Fetch" }]),
    );
    assert!(!result.success);
    assert!(result.errors[0].message.contains("already exists"));
}

#[test]
fn remove_missing_connection_fails() {
    let result = apply(
        &simple_workflow(),
        json!([{ "type": "removeConnection", "source": "Start", "target": "Shape" }]),
    );
    assert!(!result.success);
    assert!(result.errors[0].message.contains("not found"));
}

#[test]
fn update_connection_moves_to_error_port() {
    let wf = applied(
        &simple_workflow(),
        json!([{
            "type": "updateConnection",
            "source": "Fetch",
            "target": "Shape",
            "changes": { "sourceIndex": 1 }
        }]),
    );
    assert!(targets(&wf, "Fetch", 0).is_empty());
    assert_eq!(targets(&wf, "Fetch", 1), vec!["Shape"]);
}

#[test]
fn port_indices_are_bounded() {
    let wf = simple_workflow();
    for (side, index) in [("sourceIndex", 5_000_000), ("targetIndex", MAX_PORT_INDEX + 1)] {
        let result = apply(
            &wf,
            json!([{
                "type": "addConnection",
                "source": "Shape",
                "target": "Start",
                (side): index
            }]),
        );
        assert!(!result.success);
        assert!(result.workflow.is_none());
        assert_eq!(
            result.errors[0].message,
            format!("{} index {} is out of range (at most {})", side, index, MAX_PORT_INDEX)
        );
    }

    let result = apply(
        &wf,
        json!([{
            "type": "updateConnection",
            "source": "Fetch",
            "target": "Shape",
            "changes": { "sourceIndex": MAX_PORT_INDEX + 1 }
        }]),
    );
    assert!(!result.success);

    let wf = applied(
        &wf,
        json!([{
            "type": "addConnection",
            "source": "Shape",
            "target": "Start",
            "sourceIndex": MAX_PORT_INDEX
        }]),
    );
    assert_eq!(wf.ports("Shape", "main").unwrap().len(), MAX_PORT_INDEX + 1);
}

// =============================================================================
// Metadata operations
// =============================================================================

#[test]
fn metadata_operations() {
    let wf = applied(
        &simple_workflow(),
        json!([
            { "type": "updateName", "name": "  Nightly Sync " },
            { "type": "addTag", "tag": "sync" },
            { "type": "addTag", "tag": "sync" },
            { "type": "removeTag", "tag": "never-there" },
            { "type": "updateSettings", "settings": { "timezone": "UTC" } }
        ]),
    );
    assert_eq!(wf.name, "Nightly Sync");
    assert_eq!(wf.tags, vec!["sync"]);
    assert_eq!(wf.settings["timezone"], "UTC");
}

#[test]
fn empty_workflow_name_rejected() {
    let result = apply(&simple_workflow(), json!([{ "type": "updateName", "name": "  " }]));
    assert!(!result.success);
    assert_eq!(result.errors[0].operation_type, "updateName");
}
