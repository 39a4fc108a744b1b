//! API handlers

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use super::AppState;
use super::error::ApiError;
use crate::artifact::PLACEHOLDER_ARTIFACT;
use crate::domain::{ConversationTurn, DomainMetadata, GenerationRequest, RequestContext};
use crate::orchestrator::FallbackPolicy;
use crate::usage::UsageStats;

/// Body of the generate and validate endpoints
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptBody {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub conversation_history: Vec<ConversationTurn>,
}

impl PromptBody {
    fn require_prompt(&self) -> Result<String, ApiError> {
        self.prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("Prompt is required".to_string()))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    pub tokens_used: u64,
    pub remaining: u64,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub result: String,
    pub usage: UsageReport,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

pub async fn metadata(State(state): State<AppState>, context: RequestContext) -> Json<DomainMetadata> {
    debug!("metadata: called");
    Json(state.metadata.get_metadata(&context).await)
}

pub async fn usage(State(state): State<AppState>, context: RequestContext) -> Json<UsageStats> {
    debug!("usage: called");
    Json(state.usage.stats(&context.user_id()).await)
}

/// Single generation call, no validation loop
pub async fn generate(
    State(state): State<AppState>,
    context: RequestContext,
    Json(body): Json<PromptBody>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let prompt = body.require_prompt()?;
    let user_id = context.user_id();
    debug!(%user_id, prompt_len = prompt.len(), "generate: called");
    state.check_quota(&user_id).await?;

    let metadata = state.metadata.get_metadata(&context).await;
    let orchestrator = &state.orchestrator;
    let full_prompt = orchestrator
        .prompts()
        .generation_prompt(&metadata, &body.conversation_history, &prompt, orchestrator.config().history)
        .map_err(ApiError::internal)?;

    let result = match orchestrator.gateway().generate(&full_prompt).await {
        Ok(generation) => generation.text,
        Err(failure) => match orchestrator.config().fallback {
            FallbackPolicy::ReturnPlaceholder => {
                warn!(error = %failure, "All models failed, returning placeholder");
                PLACEHOLDER_ARTIFACT.to_string()
            }
            FallbackPolicy::FailClosed => return Err(failure.into()),
        },
    };

    let tokens_used = state.usage.estimate_tokens(&prompt) + state.usage.estimate_tokens(&result);
    state.usage.record(&user_id, tokens_used).await;
    let remaining = state.usage.remaining(&user_id).await;
    info!(%user_id, tokens_used, remaining, "Generated pipeline");

    Ok(Json(GenerateResponse {
        result,
        usage: UsageReport { tokens_used, remaining },
    }))
}

/// Generate/validate/repair loop streamed as server-sent events
///
/// Each event is a `data: <json>` line. The run stops when the client
/// disconnects and the stream is dropped.
pub async fn validate(
    State(state): State<AppState>,
    context: RequestContext,
    Json(body): Json<PromptBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let prompt = body.require_prompt()?;
    let user_id = context.user_id();
    debug!(%user_id, prompt_len = prompt.len(), "validate: called");
    state.check_quota(&user_id).await?;

    let metadata = state.metadata.get_metadata(&context).await;
    let request = GenerationRequest::new(prompt.clone(), metadata)
        .with_conversation(body.conversation_history)
        .with_context(context);

    let (rx, handle) = state.orchestrator.clone().start(request, state.event_buffer);

    let usage = state.usage.clone();
    tokio::spawn(async move {
        match handle.await {
            Ok(report) => {
                if let Some(artifact) = report.outcome.artifact() {
                    let tokens = usage.estimate_tokens(&prompt) + usage.estimate_tokens(artifact);
                    usage.record(&user_id, tokens).await;
                    debug!(%user_id, tokens, "validate: usage recorded");
                }
            }
            Err(e) => warn!(error = %e, "Orchestration task panicked"),
        }
    });

    let stream = rx.into_stream().map(|event| Event::default().json_data(&event));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
