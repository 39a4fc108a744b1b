//! Generation orchestrator
//!
//! Drives generate -> validate -> repair until an artifact passes validation
//! or the iteration budget runs out, reporting every step through a
//! [`ProgressSink`]. Exactly one `complete` event ends every run that still
//! has a listener.

use std::sync::Arc;

use eyre::{Context, eyre};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::run::{GenerationAttempt, OrchestrationRun, RunOutcome, RunReport, RunState};
use crate::artifact::PLACEHOLDER_ARTIFACT;
use crate::config::{Config, GenerationConfig};
use crate::domain::{DomainMetadata, GenerationRequest};
use crate::events::{Icon, Phase, ProgressEvent, ProgressReceiver, ProgressSink, SinkClosed, progress_channel};
use crate::llm::{TextGenerationGateway, TextGenerator};
use crate::prompts::{HistoryWindow, PromptLoader, build_fix_prompt};
use crate::validation::{SchemaValidator, Severity, ValidationResult};

/// What to do when every model candidate has failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FallbackPolicy {
    /// End the run with a failed `complete` event
    #[serde(rename = "fail-closed")]
    FailClosed,
    /// Continue with a canned placeholder artifact
    #[default]
    #[serde(rename = "placeholder")]
    ReturnPlaceholder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Validation passes allowed per run (at least 1)
    pub max_iterations: u32,
    pub fallback: FallbackPolicy,
    pub history: HistoryWindow,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            fallback: FallbackPolicy::default(),
            history: HistoryWindow::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            max_iterations: config.max_iterations.max(1),
            fallback: config.on_generation_failure,
            history: HistoryWindow::from_config(config),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }
}

/// Why a run stopped early
enum Halt {
    /// The receiver was dropped
    Cancelled,
    Failed(eyre::Report),
}

impl From<SinkClosed> for Halt {
    fn from(_: SinkClosed) -> Self {
        Halt::Cancelled
    }
}

/// Runs generation requests; shareable across concurrent requests
pub struct GenerationOrchestrator {
    gateway: Arc<TextGenerationGateway>,
    validator: SchemaValidator,
    prompts: Arc<PromptLoader>,
    config: OrchestratorConfig,
}

impl GenerationOrchestrator {
    pub fn new(
        gateway: Arc<TextGenerationGateway>,
        validator: SchemaValidator,
        prompts: Arc<PromptLoader>,
        config: OrchestratorConfig,
    ) -> Self {
        debug!(?config, "GenerationOrchestrator::new: called");
        Self {
            gateway,
            validator,
            prompts,
            config,
        }
    }

    /// Wire up an orchestrator from application config
    pub fn from_config(generator: Arc<dyn TextGenerator>, config: &Config) -> Self {
        let gateway = Arc::new(TextGenerationGateway::from_config(generator, &config.llm));
        let prompts = Arc::new(PromptLoader::from_dir(config.generation.prompts_dir.as_deref()));
        Self::new(
            gateway,
            SchemaValidator::new(),
            prompts,
            OrchestratorConfig::from_config(&config.generation),
        )
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<TextGenerationGateway> {
        &self.gateway
    }

    pub fn prompts(&self) -> &Arc<PromptLoader> {
        &self.prompts
    }

    /// Run on a spawned task, returning the event receiver and the task handle
    ///
    /// Dropping the receiver cancels the run.
    pub fn start(self: Arc<Self>, request: GenerationRequest, capacity: usize) -> (ProgressReceiver, JoinHandle<RunReport>) {
        debug!(capacity, "GenerationOrchestrator::start: called");
        let (sink, rx) = progress_channel(capacity);
        let handle = tokio::spawn(async move { self.run(&request, &sink).await });
        (rx, handle)
    }

    /// Run one request to completion, emitting progress to `sink`
    pub async fn run(&self, request: &GenerationRequest, sink: &ProgressSink) -> RunReport {
        let mut run = OrchestrationRun::new();
        info!(
            run_id = %run.id,
            prompt_len = request.original_prompt.len(),
            max_iterations = self.config.max_iterations,
            "Starting orchestration run"
        );

        let outcome = match self.drive(&mut run, request, sink).await {
            Ok(outcome) => outcome,
            Err(Halt::Cancelled) => {
                info!(run_id = %run.id, state = %run.state, "Caller disconnected, run cancelled");
                return RunReport {
                    run,
                    outcome: RunOutcome::Cancelled,
                };
            }
            Err(Halt::Failed(report)) => {
                let message = report.chain().map(|e| e.to_string()).collect::<Vec<_>>().join(": ");
                error!(run_id = %run.id, error = %message, "Orchestration run failed");
                RunOutcome::Failed {
                    error: message,
                    iterations: run.iteration(),
                }
            }
        };

        if let Err(SinkClosed) = self.finish(&run, &outcome, sink).await {
            debug!(run_id = %run.id, "run: receiver gone before complete event");
        }
        info!(run_id = %run.id, success = outcome.is_success(), attempts = run.attempts.len(), "Orchestration run finished");
        RunReport { run, outcome }
    }

    /// Emit the terminal events for an outcome
    async fn finish(&self, run: &OrchestrationRun, outcome: &RunOutcome, sink: &ProgressSink) -> Result<(), SinkClosed> {
        let event = match outcome {
            RunOutcome::Accepted {
                artifact, iterations, ..
            } => ProgressEvent::Complete {
                success: true,
                artifact: Some(artifact.clone()),
                iterations: *iterations,
                remaining_findings: None,
                message: format!("Pipeline validated successfully after {} iteration(s)", iterations),
                error: None,
            },
            RunOutcome::Exhausted {
                artifact,
                iterations,
                findings,
            } => ProgressEvent::Complete {
                success: false,
                artifact: artifact.clone(),
                iterations: *iterations,
                remaining_findings: Some(findings.clone()),
                message: format!(
                    "Could not fully validate after {} attempts. Manual review recommended.",
                    iterations
                ),
                error: None,
            },
            RunOutcome::Failed { error, iterations } => {
                sink.detail(Icon::Error, "Error", error.clone()).await?;
                ProgressEvent::Complete {
                    success: false,
                    artifact: run.last_artifact().map(str::to_string),
                    iterations: *iterations,
                    remaining_findings: None,
                    message: "Pipeline generation failed".to_string(),
                    error: Some(error.clone()),
                }
            }
            RunOutcome::Cancelled => return Ok(()),
        };
        sink.emit(event).await
    }

    async fn drive(
        &self,
        run: &mut OrchestrationRun,
        request: &GenerationRequest,
        sink: &ProgressSink,
    ) -> Result<RunOutcome, Halt> {
        let max = self.config.max_iterations.max(1);
        sink.status(Phase::Generating, 0, "Starting pipeline generation...").await?;
        sink.detail(Icon::Agent, "AI Agent", "Generating initial pipeline based on your request...")
            .await?;

        for iteration in 1..=max {
            run.transition(RunState::Generating(iteration));
            sink.status(Phase::Iterating, iteration, format!("Iteration {}/{}", iteration, max))
                .await?;

            let request_text = match run.last_artifact() {
                Some(last) if iteration > 1 => {
                    sink.detail(
                        Icon::Fix,
                        "Fixing Issues",
                        format!("Attempting to fix {} problem(s)...", run.findings.len()),
                    )
                    .await?;
                    build_fix_prompt(&request.original_prompt, last, &run.findings)
                }
                _ => request.original_prompt.clone(),
            };

            sink.detail(Icon::Loading, "AI Processing", "Waiting for AI response...").await?;
            let prompt = self
                .prompts
                .generation_prompt(
                    &request.domain_metadata,
                    &request.conversation,
                    &request_text,
                    self.config.history,
                )
                .context("Failed to build generation prompt")
                .map_err(Halt::Failed)?;

            let artifact = self.generate(run, iteration, prompt, sink).await?;
            sink.detail(
                Icon::Doc,
                "Pipeline Generated",
                format!("Received pipeline definition ({} characters)", artifact.chars().count()),
            )
            .await?;

            run.transition(RunState::Validating(iteration));
            sink.status(Phase::Validating, iteration, "Validating pipeline...").await?;
            let result = self.validate(&artifact, &request.domain_metadata).await?;

            if result.is_valid {
                let warnings: Vec<_> = result.warnings().cloned().collect();
                let message = match warnings.len() {
                    0 => "All checks passed. Pipeline is valid.".to_string(),
                    n => format!("All checks passed with {} warning(s). Pipeline is valid.", n),
                };
                sink.detail(Icon::Success, "Validation Passed", message).await?;
                sink.status(Phase::Complete, iteration, "Pipeline optimized and ready").await?;
                run.findings = result.findings;
                run.transition(RunState::Accepted);
                info!(run_id = %run.id, iteration, "Artifact accepted");
                return Ok(RunOutcome::Accepted {
                    artifact,
                    iterations: iteration,
                    warnings,
                });
            }

            info!(
                run_id = %run.id,
                iteration,
                findings = result.findings.len(),
                "Artifact rejected"
            );
            for finding in &result.findings {
                sink.emit(ProgressEvent::finding(finding)).await?;
            }
            let found = result.findings.len();
            run.findings = result.findings;

            if iteration < max {
                run.transition(RunState::Repairing(iteration));
                sink.detail(
                    Icon::Retry,
                    "Retry",
                    format!("Found {} issue(s). Asking AI to fix...", found),
                )
                .await?;
            }
        }

        run.transition(RunState::Exhausted);
        warn!(run_id = %run.id, max, "Iteration budget exhausted");
        sink.status(Phase::Incomplete, max, "Max iterations reached").await?;
        Ok(RunOutcome::Exhausted {
            artifact: run.last_artifact().map(str::to_string),
            iterations: max,
            findings: run.findings.clone(),
        })
    }

    /// Call the gateway, racing it against the caller going away
    async fn generate(
        &self,
        run: &mut OrchestrationRun,
        iteration: u32,
        prompt: String,
        sink: &ProgressSink,
    ) -> Result<String, Halt> {
        debug!(iteration, prompt_len = prompt.len(), "generate: called");
        let result = tokio::select! {
            biased;
            _ = sink.closed() => {
                debug!(iteration, "generate: sink closed while waiting on gateway");
                return Err(Halt::Cancelled);
            }
            result = self.gateway.generate(&prompt) => result,
        };

        match result {
            Ok(generation) => {
                debug!(iteration, model = %generation.model, "generate: gateway succeeded");
                let text = generation.text.clone();
                run.record_attempt(GenerationAttempt {
                    iteration,
                    model: generation.model,
                    prompt_sent: prompt,
                    raw_output: Some(generation.text),
                    failure_reason: None,
                });
                Ok(text)
            }
            Err(failure) => {
                let model = failure.last_model.clone().unwrap_or_default();
                match self.config.fallback {
                    FallbackPolicy::ReturnPlaceholder => {
                        warn!(iteration, error = %failure, "All models failed, using placeholder artifact");
                        run.record_attempt(GenerationAttempt {
                            iteration,
                            model,
                            prompt_sent: prompt,
                            raw_output: Some(PLACEHOLDER_ARTIFACT.to_string()),
                            failure_reason: Some(failure.kind),
                        });
                        sink.emit(ProgressEvent::Detail {
                            icon: Icon::Error,
                            title: "AI Unavailable".to_string(),
                            message: "All models failed. Using a placeholder pipeline; review it before deploying."
                                .to_string(),
                            severity: Some(Severity::Warning),
                            suggestion: None,
                        })
                        .await?;
                        Ok(PLACEHOLDER_ARTIFACT.to_string())
                    }
                    FallbackPolicy::FailClosed => {
                        debug!(iteration, "generate: fail-closed");
                        run.record_attempt(GenerationAttempt {
                            iteration,
                            model,
                            prompt_sent: prompt,
                            raw_output: None,
                            failure_reason: Some(failure.kind),
                        });
                        Err(Halt::Failed(eyre::Report::new(failure)))
                    }
                }
            }
        }
    }

    /// Validate off the async runtime; a panic in the validator fails the run
    async fn validate(&self, artifact: &str, metadata: &DomainMetadata) -> Result<ValidationResult, Halt> {
        let validator = self.validator;
        let text = artifact.to_string();
        let metadata = metadata.clone();
        tokio::task::spawn_blocking(move || validator.validate(&text, &metadata))
            .await
            .map_err(|e| Halt::Failed(eyre!("Validation crashed: {}", e)))
    }
}
