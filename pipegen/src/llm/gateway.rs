//! TextGenerationGateway - model fallback and rate-limit-aware retries
//!
//! Wraps a [`TextGenerator`] and walks an ordered list of model candidates.
//! Each model gets one initial call plus `max_retries` retries; only
//! rate-limit-class failures are retried on the same model. Anything else,
//! or a server-suggested delay longer than the configured ceiling, moves on
//! to the next candidate.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::{FailureKind, GenerationFailure, LlmError, TextGenerator};
use crate::config::LlmConfig;

/// Retry and backoff policy applied per model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial call
    pub max_retries: u32,
    /// Delay before retry N is `backoff[N-1]`; later retries reuse the last entry
    pub backoff: Vec<Duration>,
    /// Server-suggested delays above this abandon the current model
    pub max_suggested_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000),
            ],
            max_suggested_delay: Duration::from_millis(10_000),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: config.backoff_ms.iter().map(|ms| Duration::from_millis(*ms)).collect(),
            max_suggested_delay: Duration::from_millis(config.max_suggested_delay_ms),
        }
    }

    /// Delay to wait before the given retry (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let idx = (retry as usize - 1).min(self.backoff.len().saturating_sub(1));
        self.backoff.get(idx).copied().unwrap_or(Duration::ZERO)
    }

    /// Upper bound on time spent sleeping for one model
    pub fn total_backoff(&self) -> Duration {
        (1..=self.max_retries).map(|r| self.delay_for(r)).sum()
    }
}

/// Successful gateway result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub model: String,
    /// Total backend calls made, including the successful one
    pub attempts: u32,
}

/// What to do after a failed call
enum NextStep {
    Retry,
    NextModel,
}

/// Generation gateway owning model order and retry policy
///
/// Holds no per-request state; concurrent calls share only the read-only
/// candidate list and policy.
pub struct TextGenerationGateway {
    generator: Arc<dyn TextGenerator>,
    models: Vec<String>,
    policy: RetryPolicy,
}

impl TextGenerationGateway {
    pub fn new(generator: Arc<dyn TextGenerator>, models: Vec<String>, policy: RetryPolicy) -> Self {
        debug!(?models, ?policy, "TextGenerationGateway::new: called");
        Self {
            generator,
            models,
            policy,
        }
    }

    /// Create a gateway using the model list and policy from config
    pub fn from_config(generator: Arc<dyn TextGenerator>, config: &LlmConfig) -> Self {
        Self::new(generator, config.models.clone(), RetryPolicy::from_config(config))
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Generate text for a prompt, walking every model candidate before giving up
    pub async fn generate(&self, prompt: &str) -> Result<Generation, GenerationFailure> {
        debug!(prompt_len = prompt.len(), model_count = self.models.len(), "generate: called");
        let mut attempts = 0u32;
        let mut last_error: Option<LlmError> = None;
        let mut last_model: Option<String> = None;

        for model in &self.models {
            info!(%model, "Attempting generation");
            last_model = Some(model.clone());

            for attempt in 0..=self.policy.max_retries {
                if attempt > 0 {
                    let delay = self.policy.delay_for(attempt);
                    info!(
                        %model,
                        attempt,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                }

                attempts += 1;
                match self.generator.generate_content(model, prompt).await {
                    Ok(text) => {
                        info!(%model, attempt = attempt + 1, "Generation succeeded");
                        return Ok(Generation {
                            text,
                            model: model.clone(),
                            attempts,
                        });
                    }
                    Err(e) => {
                        error!(
                            %model,
                            attempt = attempt + 1,
                            total = self.policy.max_retries + 1,
                            error = %e,
                            "Generation attempt failed"
                        );
                        let step = self.next_step(&e, attempt);
                        last_error = Some(e);
                        match step {
                            NextStep::Retry => {
                                debug!(%model, "generate: retrying same model");
                                continue;
                            }
                            NextStep::NextModel => {
                                debug!(%model, "generate: abandoning model");
                                break;
                            }
                        }
                    }
                }
            }

            warn!(%model, "Model failed or exhausted retries, switching to next model");
        }

        error!(attempts, "All model candidates failed");
        Err(GenerationFailure {
            kind: FailureKind::Fatal,
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "No model candidates configured".to_string()),
            attempts,
            last_model,
        })
    }

    /// Decide whether a failure is retried on the same model
    fn next_step(&self, error: &LlmError, attempt: u32) -> NextStep {
        if !error.is_rate_limit() {
            debug!(kind = ?error.kind(), "next_step: not rate limited");
            return NextStep::NextModel;
        }

        if let Some(suggested) = error.suggested_retry_delay()
            && suggested > self.policy.max_suggested_delay
        {
            warn!(
                suggested_ms = suggested.as_millis() as u64,
                "Suggested delay too long, switching model immediately"
            );
            return NextStep::NextModel;
        }

        if attempt < self.policy.max_retries {
            debug!(attempt, "next_step: retry budget remains");
            NextStep::Retry
        } else {
            debug!(attempt, "next_step: retry budget exhausted");
            NextStep::NextModel
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{MockGenerator, MockReply};

    fn models() -> Vec<String> {
        vec!["primary".to_string(), "secondary".to_string()]
    }

    fn gateway(generator: Arc<MockGenerator>) -> TextGenerationGateway {
        TextGenerationGateway::new(generator, models(), RetryPolicy::default())
    }

    #[test]
    fn test_delay_for_reuses_last_entry() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(7), Duration::from_secs(4));
        assert_eq!(policy.total_backoff(), Duration::from_secs(7));
    }

    #[test]
    fn test_delay_for_empty_schedule() {
        let policy = RetryPolicy {
            backoff: vec![],
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(2), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_succeeds() {
        let generator = Arc::new(MockGenerator::new(vec![MockReply::text("ok")]));
        let result = gateway(generator.clone()).generate("prompt").await.unwrap();

        assert_eq!(result.text, "ok");
        assert_eq!(result.model, "primary");
        assert_eq!(result.attempts, 1);
        assert_eq!(generator.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retries_same_model_with_backoff() {
        let generator = Arc::new(MockGenerator::new(vec![
            MockReply::status(429, "Too many requests"),
            MockReply::status(503, "The model is overloaded"),
            MockReply::text("ok"),
        ]));
        let start = tokio::time::Instant::now();

        let result = gateway(generator.clone()).generate("prompt").await.unwrap();

        assert_eq!(result.model, "primary");
        assert_eq!(result.attempts, 3);
        assert_eq!(generator.models(), vec!["primary", "primary", "primary"]);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_switches_model_without_waiting() {
        let generator = Arc::new(MockGenerator::new(vec![
            MockReply::status(400, "Bad request"),
            MockReply::text("from secondary"),
        ]));
        let start = tokio::time::Instant::now();

        let result = gateway(generator.clone()).generate("prompt").await.unwrap();

        assert_eq!(result.model, "secondary");
        assert_eq!(generator.models(), vec!["primary", "secondary"]);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_suggested_delay_switches_model() {
        let generator = Arc::new(MockGenerator::new(vec![
            MockReply::status(429, "Quota exceeded. Please retry in 42.7s."),
            MockReply::text("from secondary"),
        ]));

        let result = gateway(generator.clone()).generate("prompt").await.unwrap();

        assert_eq!(result.model, "secondary");
        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_suggested_delay_keeps_model() {
        let generator = Arc::new(MockGenerator::new(vec![
            MockReply::status(429, "Please retry in 3s."),
            MockReply::text("ok"),
        ]));

        let result = gateway(generator.clone()).generate("prompt").await.unwrap();

        assert_eq!(result.model, "primary");
        assert_eq!(result.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_models_exhausted_is_fatal() {
        let generator = Arc::new(MockGenerator::always(503, "Service unavailable", 8));
        let start = tokio::time::Instant::now();

        let failure = gateway(generator.clone()).generate("prompt").await.unwrap_err();

        assert_eq!(failure.kind, FailureKind::Fatal);
        assert_eq!(failure.attempts, 8);
        assert_eq!(failure.last_model.as_deref(), Some("secondary"));
        assert_eq!(generator.call_count(), 8);
        // Two models, each bounded by 1s + 2s + 4s of backoff
        assert_eq!(start.elapsed(), Duration::from_secs(14));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_models_configured() {
        let generator = Arc::new(MockGenerator::new(vec![]));
        let gateway = TextGenerationGateway::new(generator.clone(), vec![], RetryPolicy::default());

        let failure = gateway.generate("prompt").await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::Fatal);
        assert_eq!(failure.attempts, 0);
        assert_eq!(generator.call_count(), 0);
    }
}
