//! Validation report shape plus the profile-aware collector that fills it.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Category, RequestError};

/// Named preset controlling which checks are reported and how strictly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    Minimal,
    Runtime,
    #[default]
    AiFriendly,
    Strict,
}

impl FromStr for Profile {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minimal" => Ok(Profile::Minimal),
            "runtime" => Ok(Profile::Runtime),
            "ai-friendly" => Ok(Profile::AiFriendly),
            "strict" => Ok(Profile::Strict),
            other => Err(RequestError::UnknownProfile(other.to_string())),
        }
    }
}

impl Profile {
    /// Whether findings of `tier` are reported under this profile.
    pub fn admits(self, tier: Tier) -> bool {
        let ceiling = match self {
            Profile::Minimal => Tier::Essential,
            Profile::Runtime => Tier::Runtime,
            Profile::AiFriendly => Tier::Standard,
            Profile::Strict => Tier::Strict,
        };
        tier <= ceiling
    }

    pub fn reports_warnings(self) -> bool {
        self != Profile::Minimal
    }
}

/// How much of the node's schema a single-node validation covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Required visible properties only.
    Minimal,
    /// Properties tied to the configured resource/operation.
    Operation,
    #[default]
    Full,
}

impl FromStr for ValidationMode {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minimal" => Ok(ValidationMode::Minimal),
            "operation" => Ok(ValidationMode::Operation),
            "full" => Ok(ValidationMode::Full),
            other => Err(RequestError::UnknownMode(other.to_string())),
        }
    }
}

/// Ordering matters: a profile admits every tier up to its ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// Reported under every profile.
    Critical,
    Essential,
    Runtime,
    Standard,
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub code: &'static str,
    pub category: Category,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.node_name {
            Some(name) => write!(
                f,
                "[{}:{}] {} (node '{}')",
                self.category, self.code, self.message, name
            ),
            None => write!(f, "[{}:{}] {}", self.category, self.code, self.message),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_nodes: usize,
    pub enabled_nodes: usize,
    pub trigger_nodes: usize,
    pub valid_connections: usize,
    pub invalid_connections: usize,
    pub expressions_validated: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub suggestions: Vec<String>,
    pub statistics: Statistics,
}

impl ValidationReport {
    pub fn has_code(&self, code: &str) -> bool {
        self.errors.iter().chain(&self.warnings).any(|i| i.code == code)
    }
}

/// Builder for a single issue; `Collector` decides whether it is kept.
#[derive(Debug, Clone)]
pub struct Finding {
    pub(crate) tier: Tier,
    pub(crate) issue: ValidationIssue,
}

impl Finding {
    fn new(
        code: &'static str,
        category: Category,
        severity: Severity,
        tier: Tier,
        message: String,
    ) -> Self {
        Finding {
            tier,
            issue: ValidationIssue {
                code,
                category,
                severity,
                node_id: None,
                node_name: None,
                property: None,
                message,
                fix: None,
            },
        }
    }

    pub fn error(
        code: &'static str,
        category: Category,
        tier: Tier,
        message: impl Into<String>,
    ) -> Self {
        Self::new(code, category, Severity::Error, tier, message.into())
    }

    pub fn warning(
        code: &'static str,
        category: Category,
        tier: Tier,
        message: impl Into<String>,
    ) -> Self {
        Self::new(code, category, Severity::Warning, tier, message.into())
    }

    pub fn node(mut self, id: &str, name: &str) -> Self {
        if !id.is_empty() {
            self.issue.node_id = Some(id.to_string());
        }
        self.issue.node_name = Some(name.to_string());
        self
    }

    pub fn property(mut self, property: impl Into<String>) -> Self {
        self.issue.property = Some(property.into());
        self
    }

    pub fn fix(mut self, fix: impl Into<String>) -> Self {
        self.issue.fix = Some(fix.into());
        self
    }
}

/// Accumulates findings, dropping those the active profile does not admit.
#[derive(Debug)]
pub struct Collector {
    profile: Profile,
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
    suggestions: Vec<String>,
}

impl Collector {
    pub fn new(profile: Profile) -> Self {
        Collector {
            profile,
            errors: Vec::new(),
            warnings: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn push(&mut self, finding: Finding) {
        if !self.profile.admits(finding.tier) {
            return;
        }
        match finding.issue.severity {
            Severity::Error => self.errors.push(finding.issue),
            Severity::Warning if self.profile.reports_warnings() => {
                self.warnings.push(finding.issue)
            }
            Severity::Warning => {}
        }
    }

    pub fn extend(&mut self, findings: impl IntoIterator<Item = Finding>) {
        for finding in findings {
            self.push(finding);
        }
    }

    pub fn suggest(&mut self, suggestion: impl Into<String>) {
        let suggestion = suggestion.into();
        if !self.suggestions.contains(&suggestion) {
            self.suggestions.push(suggestion);
        }
    }

    pub fn has_error(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn finish(self, statistics: Statistics) -> ValidationReport {
        ValidationReport {
            valid: self.errors.is_empty(),
            errors: self.errors,
            warnings: self.warnings,
            suggestions: self.suggestions,
            statistics,
        }
    }
}
