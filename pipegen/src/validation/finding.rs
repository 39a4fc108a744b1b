//! Validation findings

use std::fmt;

use serde::{Deserialize, Serialize};

/// What kind of problem a finding describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Syntax,
    MissingField,
    ActivityError,
    ResourceReference,
    SchemaViolation,
}

impl Category {
    /// Human-readable label used in progress events and repair prompts
    pub fn title(&self) -> &'static str {
        match self {
            Self::Syntax => "YAML Syntax",
            Self::MissingField => "Missing Field",
            Self::ActivityError => "Activity Error",
            Self::ResourceReference => "Resource Reference",
            Self::SchemaViolation => "Schema Violation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Error,
    Warning,
}

impl Severity {
    /// Critical and error findings block acceptance; warnings never do
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::Critical | Self::Error)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
        };
        write!(f, "{}", s)
    }
}

/// One problem found in an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFinding {
    pub category: Category,
    pub message: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationFinding {
    pub fn new(category: Category, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            severity,
            suggestion: None,
        }
    }

    pub fn critical(category: Category, message: impl Into<String>) -> Self {
        Self::new(category, Severity::Critical, message)
    }

    pub fn error(category: Category, message: impl Into<String>) -> Self {
        Self::new(category, Severity::Error, message)
    }

    pub fn warning(category: Category, message: impl Into<String>) -> Self {
        Self::new(category, Severity::Warning, message)
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Outcome of one validation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub findings: Vec<ValidationFinding>,
}

impl ValidationResult {
    pub fn from_findings(findings: Vec<ValidationFinding>) -> Self {
        let is_valid = !findings.iter().any(|f| f.severity.is_blocking());
        Self { is_valid, findings }
    }

    pub fn blocking(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.findings.iter().filter(|f| f.severity.is_blocking())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.findings.iter().filter(|f| !f.severity.is_blocking())
    }
}
