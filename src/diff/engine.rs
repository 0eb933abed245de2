//! Transactional application of a diff batch.
//!
//! Operations are classified into node, connection and metadata phases and
//! applied phase by phase against a private copy of the workflow. The first
//! failing operation aborts the batch; the caller's workflow is never touched.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::operation::{
    AddNode, ConnectionSpec, DiffError, DiffOperation, DiffRequest, DiffResult, MoveNode,
    NodeTarget, OperationError, RawDiffRequest, TagChange, UpdateConnection, UpdateName,
    UpdateNode, UpdateSettings,
};
use crate::error::RequestError;
use crate::parse::graph::{NodeRef, ResolveError, resolve_index, resolve_node};
use crate::parse::types::{Endpoint, Node, Workflow};
use crate::path;
use crate::validate::{Profile, ValidationOptions, WorkflowValidator, schema};

/// Default ceiling on operations per request.
pub const DEFAULT_MAX_OPERATIONS: usize = 5;

/// Highest output or input index a connection may use. Ports below it are
/// padded on demand, so the bound also caps that allocation.
pub const MAX_PORT_INDEX: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiffConfig {
    pub max_operations: usize,
    /// Validate the edited workflow and refuse it if the report is invalid.
    pub validate_after_apply: bool,
    /// Profile for the post-apply validation.
    pub profile: Profile,
}

impl Default for DiffConfig {
    fn default() -> Self {
        DiffConfig {
            max_operations: DEFAULT_MAX_OPERATIONS,
            validate_after_apply: false,
            profile: Profile::default(),
        }
    }
}

pub struct DiffEngine<'a> {
    config: DiffConfig,
    validator: Option<&'a WorkflowValidator<'a>>,
}

impl<'a> DiffEngine<'a> {
    pub fn new(config: DiffConfig) -> Self {
        DiffEngine {
            config,
            validator: None,
        }
    }

    /// Validator used when `validate_after_apply` is set.
    pub fn with_validator(mut self, validator: &'a WorkflowValidator<'a>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn config(&self) -> &DiffConfig {
        &self.config
    }

    /// Parse and apply a JSON request. The operation cap is enforced before
    /// any operation is typed.
    pub fn apply_json(
        &self,
        workflow: &Workflow,
        request_json: &str,
    ) -> Result<DiffResult, RequestError> {
        let raw = RawDiffRequest::from_json(request_json)?;
        self.check_cap(raw.operations.len())?;
        let request = raw.into_request()?;
        self.apply(workflow, &request)
    }

    #[instrument(
        skip_all,
        fields(operations = request.operations.len(), validate_only = request.validate_only)
    )]
    pub fn apply(
        &self,
        workflow: &Workflow,
        request: &DiffRequest,
    ) -> Result<DiffResult, RequestError> {
        self.check_cap(request.operations.len())?;

        let mut draft = workflow.clone();
        let mut applied = 0;
        for (index, op) in plan(&request.operations) {
            if let Err(err) = apply_operation(&mut draft, op) {
                warn!(index, op = op.name(), error = %err, "diff operation rejected");
                return Ok(DiffResult {
                    success: false,
                    workflow: None,
                    operations_applied: applied,
                    message: format!(
                        "Diff rejected: operation {} ({}) failed; no changes were applied",
                        index,
                        op.name()
                    ),
                    errors: vec![DiffError {
                        operation: index,
                        operation_type: op.name(),
                        message: err.to_string(),
                    }],
                    validation: None,
                });
            }
            debug!(index, op = op.name(), "diff operation applied");
            applied += 1;
        }

        let validation = match (self.config.validate_after_apply, self.validator) {
            (true, Some(validator)) => Some(
                validator.validate(&draft, &ValidationOptions::with_profile(self.config.profile)),
            ),
            (true, None) => {
                warn!("validateAfterApply is set but no validator is attached; skipping");
                None
            }
            (false, _) => None,
        };

        let failed = validation.as_ref().filter(|r| !r.valid).map(|r| r.errors.len());
        if let Some(error_count) = failed {
            return Ok(DiffResult {
                success: false,
                workflow: None,
                operations_applied: applied,
                message: format!(
                    "Operations applied cleanly but the resulting workflow has {} \
                     validation error(s)",
                    error_count
                ),
                errors: vec![],
                validation,
            });
        }

        if request.validate_only {
            return Ok(DiffResult {
                success: true,
                workflow: None,
                operations_applied: applied,
                message: format!(
                    "Validation successful: {} operation(s) would be applied",
                    applied
                ),
                errors: vec![],
                validation,
            });
        }

        Ok(DiffResult {
            success: true,
            workflow: Some(draft),
            operations_applied: applied,
            message: format!("Applied {} operation(s)", applied),
            errors: vec![],
            validation,
        })
    }

    fn check_cap(&self, count: usize) -> Result<(), RequestError> {
        if count > self.config.max_operations {
            warn!(count, max = self.config.max_operations, "diff batch exceeds operation cap");
            return Err(RequestError::TooManyOperations {
                count,
                max: self.config.max_operations,
            });
        }
        Ok(())
    }
}

/// Stable partition into node, connection and metadata phases. Each entry
/// keeps its position in the submitted list for error reporting.
pub fn plan(operations: &[DiffOperation]) -> Vec<(usize, &DiffOperation)> {
    let mut ordered: Vec<(usize, &DiffOperation)> = operations.iter().enumerate().collect();
    ordered.sort_by_key(|(_, op)| op.phase());
    ordered
}

fn apply_operation(workflow: &mut Workflow, op: &DiffOperation) -> Result<(), OperationError> {
    match op {
        DiffOperation::AddNode(op) => add_node(workflow, op),
        DiffOperation::RemoveNode(op) => remove_node(workflow, op),
        DiffOperation::UpdateNode(op) => update_node(workflow, op),
        DiffOperation::MoveNode(op) => move_node(workflow, op),
        DiffOperation::EnableNode(op) => set_disabled(workflow, op, false),
        DiffOperation::DisableNode(op) => set_disabled(workflow, op, true),
        DiffOperation::AddConnection(op) => add_connection(workflow, op),
        DiffOperation::RemoveConnection(op) => remove_connection(workflow, op),
        DiffOperation::UpdateConnection(op) => update_connection(workflow, op),
        DiffOperation::UpdateSettings(op) => update_settings(workflow, op),
        DiffOperation::UpdateName(op) => update_name(workflow, op),
        DiffOperation::AddTag(op) => add_tag(workflow, op),
        DiffOperation::RemoveTag(op) => remove_tag(workflow, op),
    }
}

// =============================================================================
// NODE OPERATIONS
// =============================================================================

fn add_node(workflow: &mut Workflow, op: &AddNode) -> Result<(), OperationError> {
    let spec = &op.node;
    let name = spec.name.trim();
    if name.is_empty() {
        return Err(OperationError::MissingName);
    }
    check_type(&spec.node_type)?;
    if workflow.node_by_name(name).is_some() {
        return Err(OperationError::DuplicateName(name.to_string()));
    }

    let id = match spec.id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) if workflow.node_by_id(id).is_some() => {
            return Err(OperationError::DuplicateId(id.to_string()));
        }
        Some(id) => id.to_string(),
        None => generate_id(workflow),
    };

    workflow.nodes.push(Node {
        id,
        name: name.to_string(),
        node_type: spec.node_type.clone(),
        type_version: Some(spec.type_version.unwrap_or(1.0)),
        position: spec.position.unwrap_or([0.0, 0.0]),
        parameters: spec.parameters.clone(),
        disabled: spec.disabled,
        on_error: spec.on_error,
        credentials: spec.credentials.clone(),
        extra: spec.extra.clone(),
    });
    Ok(())
}

/// Same syntactic type check the validator runs before any registry lookup.
fn check_type(node_type: &str) -> Result<(), OperationError> {
    let Some(finding) = schema::check_type_format(node_type) else {
        return Ok(());
    };
    let message = match finding.issue.fix {
        Some(fix) => format!("{}. {}", finding.issue.message, fix),
        None => finding.issue.message,
    };
    Err(OperationError::InvalidType(message))
}

/// First `node-N` id not already taken. Deterministic for a given workflow.
fn generate_id(workflow: &Workflow) -> String {
    (workflow.nodes.len() + 1..)
        .map(|n| format!("node-{}", n))
        .find(|id| workflow.node_by_id(id).is_none())
        .unwrap_or_default()
}

fn remove_node(workflow: &mut Workflow, op: &NodeTarget) -> Result<(), OperationError> {
    let idx = resolve_index(workflow, &op.reference())?;
    let removed = workflow.nodes.remove(idx);
    workflow.connections.remove(&removed.name);
    for outputs in workflow.connections.values_mut() {
        for ports in outputs.values_mut() {
            for port in ports.iter_mut() {
                port.retain(|e| e.node != removed.name);
            }
        }
    }
    prune_empty(workflow);
    Ok(())
}

fn update_node(workflow: &mut Workflow, op: &UpdateNode) -> Result<(), OperationError> {
    let idx = resolve_index(workflow, &op.reference())?;
    let current = &workflow.nodes[idx];
    let invalid = |message: String| OperationError::InvalidUpdate {
        node: current.name.clone(),
        message,
    };

    let mut value = serde_json::to_value(current).map_err(|e| invalid(e.to_string()))?;
    for (key, new_value) in &op.updates {
        if key == "id" || key.starts_with("id.") {
            if new_value.as_str() == Some(current.id.as_str()) {
                continue;
            }
            return Err(OperationError::IdChange(current.name.clone()));
        }
        path::set(&mut value, key, new_value.clone()).map_err(invalid)?;
    }
    let updated: Node = serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;
    if updated.node_type != current.node_type {
        check_type(&updated.node_type)?;
    }

    let old_name = current.name.clone();
    if updated.name != old_name {
        if updated.name.trim().is_empty() {
            return Err(OperationError::MissingName);
        }
        if workflow.node_by_name(&updated.name).is_some() {
            return Err(OperationError::DuplicateName(updated.name));
        }
        rename_references(workflow, &old_name, &updated.name);
    }
    workflow.nodes[idx] = updated;
    Ok(())
}

fn move_node(workflow: &mut Workflow, op: &MoveNode) -> Result<(), OperationError> {
    let idx = resolve_index(workflow, &op.reference())?;
    workflow.nodes[idx].position = op.position;
    Ok(())
}

fn set_disabled(
    workflow: &mut Workflow,
    op: &NodeTarget,
    disabled: bool,
) -> Result<(), OperationError> {
    let idx = resolve_index(workflow, &op.reference())?;
    workflow.nodes[idx].disabled = disabled;
    Ok(())
}

/// Point every connection key and endpoint at the node's new name.
fn rename_references(workflow: &mut Workflow, old: &str, new: &str) {
    if let Some(outputs) = workflow.connections.remove(old) {
        workflow.connections.insert(new.to_string(), outputs);
    }
    for outputs in workflow.connections.values_mut() {
        for ports in outputs.values_mut() {
            for endpoint in ports.iter_mut().flatten() {
                if endpoint.node == old {
                    endpoint.node = new.to_string();
                }
            }
        }
    }
}

// =============================================================================
// CONNECTION OPERATIONS
// =============================================================================

/// Resolve a connection endpoint given as id or name to the node's name.
fn endpoint_name(workflow: &Workflow, raw: &str) -> Result<String, ResolveError> {
    let reference = NodeRef {
        node_id: Some(raw.to_string()),
        node_name: Some(raw.to_string()),
    };
    match resolve_node(workflow, &reference) {
        Ok(node) => Ok(node.name.clone()),
        Err(ResolveError::NotFound(_)) => Err(ResolveError::NotFound(format!("'{}'", raw))),
        Err(other) => Err(other),
    }
}

fn describe(source: &str, target: &str, spec: &ConnectionSpec) -> String {
    format!(
        "'{}' {}[{}] -> '{}' {}[{}]",
        source,
        spec.source_output(),
        spec.source_index(),
        target,
        spec.target_input(),
        spec.target_index()
    )
}

fn check_port_index(side: &'static str, index: usize) -> Result<(), OperationError> {
    if index > MAX_PORT_INDEX {
        return Err(OperationError::PortIndexOutOfRange {
            side,
            index,
            max: MAX_PORT_INDEX,
        });
    }
    Ok(())
}

fn add_connection(workflow: &mut Workflow, spec: &ConnectionSpec) -> Result<(), OperationError> {
    check_port_index("sourceIndex", spec.source_index())?;
    check_port_index("targetIndex", spec.target_index())?;
    let source = endpoint_name(workflow, &spec.source)?;
    let target = endpoint_name(workflow, &spec.target)?;
    let endpoint = Endpoint {
        node: target.clone(),
        kind: spec.target_input().to_string(),
        index: spec.target_index(),
    };

    let ports = workflow
        .connections
        .entry(source.clone())
        .or_default()
        .entry(spec.source_output().to_string())
        .or_default();
    while ports.len() <= spec.source_index() {
        ports.push(Vec::new());
    }
    let port = &mut ports[spec.source_index()];
    if port.contains(&endpoint) {
        return Err(OperationError::ConnectionExists(describe(&source, &target, spec)));
    }
    port.push(endpoint);
    Ok(())
}

fn remove_connection(workflow: &mut Workflow, spec: &ConnectionSpec) -> Result<(), OperationError> {
    // Unknown names still match, so dangling connections can be cleaned up.
    let source = endpoint_name(workflow, &spec.source).unwrap_or_else(|_| spec.source.clone());
    let target = endpoint_name(workflow, &spec.target).unwrap_or_else(|_| spec.target.clone());
    let not_found = || OperationError::ConnectionNotFound(describe(&source, &target, spec));

    let port = workflow
        .connections
        .get_mut(&source)
        .and_then(|outputs| outputs.get_mut(spec.source_output()))
        .and_then(|ports| ports.get_mut(spec.source_index()))
        .ok_or_else(not_found)?;
    let position = port
        .iter()
        .position(|e| {
            e.node == target && e.kind == spec.target_input() && e.index == spec.target_index()
        })
        .ok_or_else(not_found)?;
    port.remove(position);
    prune_empty(workflow);
    Ok(())
}

fn update_connection(workflow: &mut Workflow, op: &UpdateConnection) -> Result<(), OperationError> {
    let (current, updated) = op.split();
    remove_connection(workflow, &current)?;
    add_connection(workflow, &updated)
}

/// Drop connection entries whose ports are all empty. Empty ports in front
/// of a used one are kept so indices stay meaningful.
fn prune_empty(workflow: &mut Workflow) {
    for outputs in workflow.connections.values_mut() {
        for ports in outputs.values_mut() {
            while ports.last().is_some_and(Vec::is_empty) {
                ports.pop();
            }
        }
        outputs.retain(|_, ports| !ports.is_empty());
    }
    workflow.connections.retain(|_, outputs| !outputs.is_empty());
}

// =============================================================================
// METADATA OPERATIONS
// =============================================================================

fn update_settings(workflow: &mut Workflow, op: &UpdateSettings) -> Result<(), OperationError> {
    for (key, value) in &op.settings {
        match value {
            Value::Null => workflow.settings.remove(key),
            other => workflow.settings.insert(key.clone(), other.clone()),
        };
    }
    Ok(())
}

fn update_name(workflow: &mut Workflow, op: &UpdateName) -> Result<(), OperationError> {
    let name = op.name.trim();
    if name.is_empty() {
        return Err(OperationError::EmptyName);
    }
    workflow.name = name.to_string();
    Ok(())
}

fn add_tag(workflow: &mut Workflow, op: &TagChange) -> Result<(), OperationError> {
    let tag = op.tag.trim();
    if tag.is_empty() {
        return Err(OperationError::EmptyTag);
    }
    if !workflow.tags.iter().any(|t| t == tag) {
        workflow.tags.push(tag.to_string());
    }
    Ok(())
}

fn remove_tag(workflow: &mut Workflow, op: &TagChange) -> Result<(), OperationError> {
    workflow.tags.retain(|t| t != op.tag.trim());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::operation::NodeSpec;

    fn add(name: &str) -> DiffOperation {
        DiffOperation::AddNode(AddNode {
            node: NodeSpec {
                name: name.into(),
                node_type: "pkg.set".into(),
                ..Default::default()
            },
            description: None,
        })
    }

    fn tag(tag: &str) -> DiffOperation {
        DiffOperation::AddTag(TagChange {
            tag: tag.into(),
            description: None,
        })
    }

    #[test]
    fn plan_is_a_stable_partition() {
        let ops = vec![tag("t"), add("A"), tag("u"), add("B")];
        let order: Vec<usize> = plan(&ops).into_iter().map(|(i, _)| i).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn generated_ids_skip_taken_ones() {
        let mut wf = Workflow::default();
        apply_operation(&mut wf, &add("A")).unwrap();
        assert_eq!(wf.nodes[0].id, "node-1");
        wf.nodes.push(Node { id: "node-3".into(), ..wf.nodes[0].clone() });
        wf.nodes[1].name = "C".into();
        apply_operation(&mut wf, &add("B")).unwrap();
        assert_eq!(wf.nodes[2].id, "node-4");
    }

    #[test]
    fn null_setting_removes_key() {
        let mut wf = Workflow::default();
        wf.settings.insert("timezone".into(), Value::String("UTC".into()));
        let mut settings = serde_json::Map::new();
        settings.insert("timezone".into(), Value::Null);
        settings.insert("saveManualExecutions".into(), Value::Bool(true));
        update_settings(&mut wf, &UpdateSettings { settings, description: None }).unwrap();
        assert!(!wf.settings.contains_key("timezone"));
        assert_eq!(wf.settings.get("saveManualExecutions"), Some(&Value::Bool(true)));
    }
}
