//! HTTP transport
//!
//! Thin axum layer over the orchestrator, the metadata providers and the
//! usage meter. Quota checks and charging happen here and nowhere else.

mod error;
mod extract;
mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use eyre::{Context, Result};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

pub use error::ApiError;
pub use handlers::{GenerateResponse, PromptBody, UsageReport};

use crate::config::Config;
use crate::llm::create_generator;
use crate::metadata::{ChainedMetadataProvider, MetadataProvider};
use crate::orchestrator::GenerationOrchestrator;
use crate::usage::{InMemoryUsageMeter, UsageMeter};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<GenerationOrchestrator>,
    pub metadata: Arc<dyn MetadataProvider>,
    pub usage: Arc<dyn UsageMeter>,
    /// Progress events buffered per run
    pub event_buffer: usize,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<GenerationOrchestrator>,
        metadata: Arc<dyn MetadataProvider>,
        usage: Arc<dyn UsageMeter>,
        event_buffer: usize,
    ) -> Self {
        Self {
            orchestrator,
            metadata,
            usage,
            event_buffer,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        debug!("AppState::from_config: called");
        let generator = create_generator(&config.llm).context("Failed to create text generator")?;
        Ok(Self::new(
            Arc::new(GenerationOrchestrator::from_config(generator, config)),
            ChainedMetadataProvider::from_config(&config.metadata).shared(),
            Arc::new(InMemoryUsageMeter::from_config(&config.usage)),
            config.server.event_buffer,
        ))
    }

    async fn check_quota(&self, user_id: &str) -> Result<(), ApiError> {
        if self.usage.remaining(user_id).await == 0 {
            let stats = self.usage.stats(user_id).await;
            info!(%user_id, daily_used = stats.daily_used, "Daily quota exhausted");
            return Err(ApiError::QuotaExceeded {
                daily_limit: stats.daily_limit,
            });
        }
        Ok(())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/validate", post(handlers::validate))
        .route("/api/generate", post(handlers::generate))
        .route("/api/metadata", get(handlers::metadata))
        .route("/api/usage", get(handlers::usage))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until ctrl-c
pub async fn serve(config: &Config) -> Result<()> {
    let state = AppState::from_config(config)?;
    let listener = TcpListener::bind(&config.server.bind)
        .await
        .context(format!("Failed to bind {}", config.server.bind))?;

    info!(bind = %config.server.bind, "pipegen server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
        .context("Server error")?;
    Ok(())
}
