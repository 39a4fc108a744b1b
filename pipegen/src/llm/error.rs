//! LLM error types

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Server hint embedded in error text, e.g. "Please retry in 37.5s"
static RETRY_IN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"retry in ([0-9]+(?:\.[0-9]+)?)s").expect("retry-in pattern is a valid regex")
});

/// Text markers that identify an overloaded or throttled backend
const RATE_LIMIT_MARKERS: &[&str] = &["overloaded", "rate limit"];

/// Errors from a single call to a text-generation backend
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// HTTP status of the failed call, if the backend answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            LlmError::ApiError { status, .. } => Some(*status),
            LlmError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if this is a rate-limit-class failure (429/503 or overload markers)
    pub fn is_rate_limit(&self) -> bool {
        if matches!(self.status(), Some(429 | 503)) {
            return true;
        }
        let text = self.to_string().to_lowercase();
        RATE_LIMIT_MARKERS.iter().any(|marker| text.contains(marker))
    }

    /// Server-suggested retry delay parsed from the error text
    pub fn suggested_retry_delay(&self) -> Option<Duration> {
        let text = self.to_string();
        let captures = RETRY_IN.captures(&text)?;
        let seconds: f64 = captures.get(1)?.as_str().parse().ok()?;
        let millis = (seconds * 1000.0).ceil();
        if !millis.is_finite() || millis < 0.0 {
            return None;
        }
        Some(Duration::from_millis(millis as u64))
    }

    /// Classify this error for gateway bookkeeping
    pub fn kind(&self) -> FailureKind {
        if self.is_rate_limit() {
            FailureKind::RateLimited
        } else if matches!(self, LlmError::Network(_) | LlmError::Timeout(_))
            || self.status().is_some_and(|s| s >= 500)
        {
            FailureKind::Transient
        } else {
            FailureKind::Fatal
        }
    }
}

/// Failure classes reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    RateLimited,
    Transient,
    Fatal,
}

/// The gateway's only failure: every model candidate was tried and none produced text
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("generation failed ({kind:?}) after {attempts} attempt(s): {message}")]
pub struct GenerationFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Total backend calls made across all models
    pub attempts: u32,
    /// Last model that was tried
    pub last_model: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, message: &str) -> LlmError {
        LlmError::ApiError {
            status,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_is_rate_limit_by_status() {
        assert!(api(429, "Too many requests").is_rate_limit());
        assert!(api(503, "Service unavailable").is_rate_limit());
        assert!(!api(500, "Server error").is_rate_limit());
        assert!(!api(400, "Bad request").is_rate_limit());
    }

    #[test]
    fn test_is_rate_limit_by_marker() {
        assert!(LlmError::InvalidResponse("The model is overloaded".to_string()).is_rate_limit());
        assert!(api(500, "Rate limit exceeded for project").is_rate_limit());
        assert!(!LlmError::InvalidResponse("Bad JSON".to_string()).is_rate_limit());
    }

    #[test]
    fn test_digits_in_message_are_not_a_status() {
        assert!(!api(500, "Scanned 14290 rows before failing").is_rate_limit());
        assert_eq!(api(500, "Scanned 14290 rows before failing").kind(), FailureKind::Transient);
    }

    #[test]
    fn test_suggested_retry_delay() {
        let err = api(429, "Quota exceeded. Please retry in 37.5s.");
        assert_eq!(err.suggested_retry_delay(), Some(Duration::from_millis(37_500)));

        let err = api(429, "Please retry in 2s");
        assert_eq!(err.suggested_retry_delay(), Some(Duration::from_secs(2)));

        assert_eq!(api(503, "Service unavailable").suggested_retry_delay(), None);
    }

    #[test]
    fn test_suggested_retry_delay_rounds_up() {
        let err = api(429, "retry in 0.0004s");
        assert_eq!(err.suggested_retry_delay(), Some(Duration::from_millis(1)));
    }

    #[test]
    fn test_kind() {
        assert_eq!(api(503, "unavailable").kind(), FailureKind::RateLimited);
        assert_eq!(api(500, "boom").kind(), FailureKind::Transient);
        assert_eq!(LlmError::Timeout(Duration::from_secs(30)).kind(), FailureKind::Transient);
        assert_eq!(api(401, "unauthorized").kind(), FailureKind::Fatal);
        assert_eq!(LlmError::InvalidResponse("no text".to_string()).kind(), FailureKind::Fatal);
    }
}
