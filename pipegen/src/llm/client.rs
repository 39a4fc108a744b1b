//! TextGenerator trait definition

use async_trait::async_trait;

use super::LlmError;

/// Stateless text-generation backend - each call is independent
///
/// Given a model identifier and the full prompt text, return the generated
/// text or fail. Retry, backoff, and model fallback live in the gateway;
/// implementations make exactly one remote call per invocation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_content(&self, model: &str, prompt: &str) -> Result<String, LlmError>;
}
