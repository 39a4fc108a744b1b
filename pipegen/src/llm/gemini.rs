//! Gemini API client implementation
//!
//! Implements the TextGenerator trait for the `generateContent` endpoint.
//! One HTTP call per invocation; the gateway owns retries.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{LlmError, TextGenerator};
use crate::config::LlmConfig;

/// Gemini `generateContent` client
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    http: Client,
    timeout: Duration,
}

impl GeminiClient {
    /// Create a new client from configuration
    ///
    /// Reads the API key from the environment variable named in config.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(base_url = %config.base_url, "from_config: called");
        let api_key = config
            .get_api_key()
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let timeout = Duration::from_millis(config.timeout_ms);
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            timeout,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    /// Build the request body for a single-turn prompt
    fn build_request_body(&self, prompt: &str) -> serde_json::Value {
        debug!(prompt_len = prompt.len(), "build_request_body: called");
        serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }],
            }],
        })
    }

    /// Concatenate the text parts of the first candidate
    fn parse_response(&self, api_response: GeminiResponse) -> Result<String, LlmError> {
        debug!(candidates = api_response.candidates.len(), "parse_response: called");
        let candidate = api_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("Response contained no candidates".to_string()))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            debug!(finish_reason = ?candidate.finish_reason, "parse_response: empty candidate");
            return Err(LlmError::InvalidResponse(format!(
                "Candidate contained no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(text)
    }

    /// Pull the human-readable message out of an error body, if it is the usual JSON envelope
    fn error_message(body: &str) -> String {
        serde_json::from_str::<GeminiErrorEnvelope>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string())
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_content(&self, model: &str, prompt: &str) -> Result<String, LlmError> {
        debug!(%model, prompt_len = prompt.len(), "generate_content: called");
        let body = self.build_request_body(prompt);

        let response = self
            .http
            .post(self.endpoint(model))
            .header("x-goog-api-key", self.api_key.clone())
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    debug!(%model, "generate_content: timed out");
                    LlmError::Timeout(self.timeout)
                } else {
                    debug!(%model, error = %e, "generate_content: network error");
                    LlmError::Network(e)
                }
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            debug!(%model, status, "generate_content: API error");
            return Err(LlmError::ApiError {
                status,
                message: Self::error_message(&text),
            });
        }

        debug!(%model, "generate_content: success");
        let api_response: GeminiResponse = response.json().await?;
        self.parse_response(api_response)
    }
}

// Gemini API response types

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient {
            api_key: "test-key".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            http: Client::new(),
            timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_build_request_body() {
        let body = client().build_request_body("Build a pipeline");

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Build a pipeline");
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            client().endpoint("gemini-2.5-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn test_parse_response_joins_parts() {
        let response: GeminiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "PIPELINE_YAML:\n" }, { "text": "pipeline:\n" }] },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();

        let text = client().parse_response(response).unwrap();
        assert_eq!(text, "PIPELINE_YAML:\npipeline:\n");
    }

    #[test]
    fn test_parse_response_without_candidates() {
        let response: GeminiResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(client().parse_response(response).is_err());
    }

    #[test]
    fn test_parse_response_blocked_candidate() {
        let response: GeminiResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        }))
        .unwrap();

        let err = client().parse_response(response).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_error_message_extracts_envelope() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded. Please retry in 41.2s.","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(
            GeminiClient::error_message(body),
            "Quota exceeded. Please retry in 41.2s."
        );
        assert_eq!(GeminiClient::error_message("plain text"), "plain text");
    }
}
