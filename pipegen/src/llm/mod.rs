//! LLM module for pipegen
//!
//! Provides the text-generation backend trait, the Gemini implementation,
//! and the gateway that layers model fallback and backoff on top.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod error;
mod gateway;
mod gemini;

pub use client::TextGenerator;
#[cfg(test)]
pub use client::mock;
pub use error::{FailureKind, GenerationFailure, LlmError};
pub use gateway::{Generation, RetryPolicy, TextGenerationGateway};
pub use gemini::GeminiClient;

use crate::config::LlmConfig;

/// Create a text generator based on the provider specified in config
///
/// Supports the "gemini" provider.
pub fn create_generator(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>, LlmError> {
    debug!(provider = %config.provider, models = ?config.models, "create_generator: called");
    match config.provider.as_str() {
        "gemini" => {
            debug!("create_generator: creating Gemini client");
            Ok(Arc::new(GeminiClient::from_config(config)?))
        }
        other => {
            debug!(provider = %other, "create_generator: unknown provider");
            Err(LlmError::InvalidResponse(format!(
                "Unknown LLM provider: '{}'. Supported: gemini",
                other
            )))
        }
    }
}
