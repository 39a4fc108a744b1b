//! Prompt Loader
//!
//! Loads prompt templates from an override directory or falls back to
//! embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Context, Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;
use super::history::{HistoryWindow, format_history};
use crate::domain::{ConversationTurn, DomainMetadata};

/// Context for rendering the generation prompt
#[derive(Debug, Clone, Serialize)]
pub struct GenerationPromptContext {
    /// Schema and response-layout instructions
    pub system: String,
    /// Pretty-printed domain metadata
    pub metadata: String,
    /// Rendered conversation history, if any
    pub history: Option<String>,
    /// The user request, or a repair prompt on later iterations
    pub request: String,
}

impl GenerationPromptContext {
    pub fn new(
        system: String,
        metadata: &DomainMetadata,
        conversation: &[ConversationTurn],
        request: &str,
        window: HistoryWindow,
    ) -> Result<Self> {
        debug!(
            request_len = request.len(),
            turns = conversation.len(),
            "GenerationPromptContext::new: called"
        );
        let metadata = serde_json::to_string_pretty(metadata).context("Failed to serialize domain metadata")?;
        Ok(Self {
            system,
            metadata,
            history: format_history(conversation, window),
            request: request.to_string(),
        })
    }
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// Override directory (e.g., `prompts/`)
    override_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that checks `dir` before the embedded templates
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let exists = dir.is_dir();
        debug!(?dir, %exists, "PromptLoader::new: called");
        Self {
            hbs: engine(),
            override_dir: exists.then(|| dir.to_path_buf()),
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: engine(),
            override_dir: None,
        }
    }

    /// Create from the optional configured override directory
    pub fn from_dir(dir: Option<&Path>) -> Self {
        match dir {
            Some(dir) => Self::new(dir),
            None => Self::embedded_only(),
        }
    }

    /// Load a template by name
    ///
    /// Checks in order:
    /// 1. Override: `{dir}/{name}.pmt`
    /// 2. Embedded fallback
    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(ref dir) = self.override_dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found in override directory");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt {}: {}", path.display(), e));
            }
            debug!(?path, "PromptLoader::load_template: not found in override directory");
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!(%name, "PromptLoader::load_template: found in embedded");
            return Ok(content.to_string());
        }

        debug!(%name, "PromptLoader::load_template: not found anywhere");
        Err(eyre!("Prompt template not found: {}", name))
    }

    /// The system prompt describing the schema and response layout
    pub fn system_prompt(&self) -> Result<String> {
        debug!("PromptLoader::system_prompt: called");
        self.load_template("system")
    }

    /// Render the full prompt sent to the generator
    pub fn render_generation(&self, context: &GenerationPromptContext) -> Result<String> {
        debug!(
            request_len = context.request.len(),
            has_history = context.history.is_some(),
            "PromptLoader::render_generation: called"
        );
        let template = self.load_template("generate")?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template generate: {}", e))
    }

    /// Assemble the generation prompt for one request
    pub fn generation_prompt(
        &self,
        metadata: &DomainMetadata,
        conversation: &[ConversationTurn],
        request: &str,
        window: HistoryWindow,
    ) -> Result<String> {
        let context = GenerationPromptContext::new(self.system_prompt()?, metadata, conversation, request, window)?;
        self.render_generation(&context)
    }
}

fn engine() -> Handlebars<'static> {
    let mut hbs = Handlebars::new();
    // Prompts are plain text, not HTML
    hbs.register_escape_fn(handlebars::no_escape);
    hbs
}
