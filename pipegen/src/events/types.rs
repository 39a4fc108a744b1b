//! Progress events for one orchestration run
//!
//! Serialized as JSON objects tagged with a `type` field:
//! - `status` marks phase changes (generating, iterating, validating, ...)
//! - `detail` carries one step or finding
//! - `complete` is the terminal outcome, emitted exactly once and last

use serde::{Deserialize, Serialize};

use crate::validation::{Severity, ValidationFinding};

/// Phase reported by status events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Generating,
    Iterating,
    Validating,
    Complete,
    Incomplete,
}

/// Icon hint for detail events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Icon {
    Agent,
    Loading,
    Doc,
    Success,
    Error,
    Retry,
    Fix,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum ProgressEvent {
    Status {
        phase: Phase,
        iteration: u32,
        message: String,
    },
    Detail {
        icon: Icon,
        title: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        severity: Option<Severity>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suggestion: Option<String>,
    },
    Complete {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        artifact: Option<String>,
        iterations: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        remaining_findings: Option<Vec<ValidationFinding>>,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl ProgressEvent {
    pub fn status(phase: Phase, iteration: u32, message: impl Into<String>) -> Self {
        Self::Status {
            phase,
            iteration,
            message: message.into(),
        }
    }

    pub fn detail(icon: Icon, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Detail {
            icon,
            title: title.into(),
            message: message.into(),
            severity: None,
            suggestion: None,
        }
    }

    /// Detail event describing one validation finding
    pub fn finding(finding: &ValidationFinding) -> Self {
        Self::Detail {
            icon: Icon::Error,
            title: format!("Problem: {}", finding.category),
            message: finding.message.clone(),
            severity: Some(finding.severity),
            suggestion: finding.suggestion.clone(),
        }
    }

    /// Event type name as it appears on the wire
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Detail { .. } => "detail",
            Self::Complete { .. } => "complete",
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Category;

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_value(ProgressEvent::status(Phase::Iterating, 2, "Iteration 2/5")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "status", "phase": "iterating", "iteration": 2, "message": "Iteration 2/5" })
        );
    }

    #[test]
    fn test_finding_detail() {
        let finding = ValidationFinding::warning(Category::ActivityError, "Notebook activity \"A\" is missing notebookId")
            .with_suggestion("Add a notebookId");
        let json = serde_json::to_value(ProgressEvent::finding(&finding)).unwrap();

        assert_eq!(json["type"], "detail");
        assert_eq!(json["icon"], "error");
        assert_eq!(json["title"], "Problem: Activity Error");
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["suggestion"], "Add a notebookId");
    }

    #[test]
    fn test_complete_uses_camel_case() {
        let event = ProgressEvent::Complete {
            success: false,
            artifact: Some("PIPELINE_YAML:".to_string()),
            iterations: 5,
            remaining_findings: Some(vec![]),
            message: "done".to_string(),
            error: None,
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "complete");
        assert!(json.get("remainingFindings").is_some());
        assert!(json.get("error").is_none());
        assert!(event.is_complete());
        assert_eq!(event.event_type(), "complete");

        let back: ProgressEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_plain_detail_omits_optional_fields() {
        let json = serde_json::to_value(ProgressEvent::detail(Icon::Agent, "AI Agent", "Generating...")).unwrap();
        assert!(json.get("severity").is_none());
        assert!(json.get("suggestion").is_none());
    }
}
