//! WASM entry points for browser and agent-host use.
//!
//! Every export takes JSON strings and returns a `{ status, ... }` object:
//! `success` with the result, or `error` with a coded request error.

use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;

use crate::diff::{DiffConfig, DiffEngine, DiffResult};
use crate::error::RequestError;
use crate::registry::{EditDistanceSuggester, StaticRegistry};
use crate::validate::{
    Profile, ValidationMode, ValidationOptions, ValidationReport, WorkflowValidator,
};

/// Validate a workflow against the given node type catalogue.
#[wasm_bindgen]
pub fn validate_workflow(
    workflow_json: &str,
    node_types_json: &str,
    options_json: &str,
) -> JsValue {
    to_js(validate_workflow_inner(workflow_json, node_types_json, options_json))
}

fn validate_workflow_inner(
    workflow_json: &str,
    node_types_json: &str,
    options_json: &str,
) -> Result<ValidationReport, RequestError> {
    let workflow = crate::parse::parse(workflow_json)?;
    let registry = registry_from(node_types_json)?;
    let options: ValidationOptions = config_from(options_json, "validation options")?;
    let suggester = EditDistanceSuggester::from_registry(&registry);
    let validator = WorkflowValidator::new(&registry).with_similarity(&suggester);
    Ok(validator.validate(&workflow, &options))
}

/// Validate one node configuration. `mode` and `profile` use their wire names.
#[wasm_bindgen]
pub fn validate_node(
    node_type: &str,
    config_json: &str,
    node_types_json: &str,
    mode: &str,
    profile: &str,
) -> JsValue {
    to_js(validate_node_inner(node_type, config_json, node_types_json, mode, profile))
}

fn validate_node_inner(
    node_type: &str,
    config_json: &str,
    node_types_json: &str,
    mode: &str,
    profile: &str,
) -> Result<ValidationReport, RequestError> {
    let mode: ValidationMode = if mode.is_empty() { Default::default() } else { mode.parse()? };
    let profile: Profile = if profile.is_empty() { Default::default() } else { profile.parse()? };
    let config: Value = config_from(config_json, "node configuration")?;
    let registry = registry_from(node_types_json)?;
    let suggester = EditDistanceSuggester::from_registry(&registry);
    let validator = WorkflowValidator::new(&registry).with_similarity(&suggester);
    Ok(validator.validate_node(node_type, &config, mode, profile))
}

/// Apply a diff batch. The catalogue is only consulted when the config asks
/// for post-apply validation.
#[wasm_bindgen]
pub fn apply_diff(
    workflow_json: &str,
    request_json: &str,
    node_types_json: &str,
    config_json: &str,
) -> JsValue {
    to_js(apply_diff_inner(workflow_json, request_json, node_types_json, config_json))
}

fn apply_diff_inner(
    workflow_json: &str,
    request_json: &str,
    node_types_json: &str,
    config_json: &str,
) -> Result<DiffResult, RequestError> {
    let workflow = crate::parse::parse(workflow_json)?;
    let config: DiffConfig = config_from(config_json, "diff config")?;
    let registry = registry_from(node_types_json)?;
    let validator = WorkflowValidator::new(&registry);
    DiffEngine::new(config)
        .with_validator(&validator)
        .apply_json(&workflow, request_json)
}

fn registry_from(node_types_json: &str) -> Result<StaticRegistry, RequestError> {
    if node_types_json.trim().is_empty() {
        return Ok(StaticRegistry::new());
    }
    StaticRegistry::from_json(node_types_json)
}

/// Empty input means "use the defaults".
fn config_from<T>(json: &str, what: &'static str) -> Result<T, RequestError>
where
    T: serde::de::DeserializeOwned + Default,
{
    if json.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(json).map_err(|e| RequestError::json(what, e))
}

// ---------------------------------------------------------------------------
// DTOs for serialization to JS
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ErrorDto {
    code: &'static str,
    message: String,
}

impl From<RequestError> for ErrorDto {
    fn from(e: RequestError) -> Self {
        ErrorDto {
            code: e.code(),
            message: e.to_string(),
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
enum Response<T> {
    Success { result: T },
    Error { error: ErrorDto },
}

impl<T> From<Result<T, RequestError>> for Response<T> {
    fn from(result: Result<T, RequestError>) -> Self {
        match result {
            Ok(result) => Response::Success { result },
            Err(e) => Response::Error { error: e.into() },
        }
    }
}

fn to_js<T: Serialize>(result: Result<T, RequestError>) -> JsValue {
    let response = Response::from(result);
    // Plain JS objects rather than Maps for the free-form parameter trees.
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    response.serialize(&serializer).unwrap_or(JsValue::NULL)
}
