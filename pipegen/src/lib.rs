//! pipegen - natural-language to data-pipeline generator
//!
//! Turns a request like "copy the raw sales files into a staging table
//! every day" into a pipeline definition, checks it against a schema and
//! feeds any problems back to the generator until it passes or the
//! iteration budget runs out.
//!
//! # Core Concepts
//!
//! - **Generate, validate, repair**: each iteration either passes
//!   validation or produces a repair prompt listing what was wrong
//! - **Model fallback**: an ordered list of models, with backoff on rate limits
//! - **Progress streaming**: every step is reported as a typed event, ending
//!   with exactly one `complete` event
//! - **Lenient by default**: warnings never block acceptance
//!
//! # Modules
//!
//! - [`llm`] - generator trait, Gemini client and the fallback gateway
//! - [`artifact`] - textual layout of a generated artifact
//! - [`pipeline`] - typed view of the pipeline document
//! - [`validation`] - schema validator and findings
//! - [`prompts`] - prompt templates and repair prompts
//! - [`events`] - progress events and the channel that carries them
//! - [`orchestrator`] - the generate/validate/repair loop
//! - [`metadata`] - where workspace and table listings come from
//! - [`usage`] - per-user daily token quota
//! - [`server`] - HTTP API
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod artifact;
pub mod cli;
pub mod config;
pub mod domain;
pub mod events;
pub mod llm;
pub mod metadata;
pub mod orchestrator;
pub mod pipeline;
pub mod prompts;
pub mod server;
pub mod usage;
pub mod validation;

// Re-export commonly used types
pub use artifact::{Artifact, ArtifactError};
pub use config::Config;
pub use domain::{ConversationTurn, DomainMetadata, GenerationRequest, RequestContext};
pub use events::{ProgressEvent, ProgressReceiver, ProgressSink, progress_channel};
pub use llm::{GenerationFailure, LlmError, TextGenerationGateway, TextGenerator, create_generator};
pub use orchestrator::{FallbackPolicy, GenerationOrchestrator, OrchestratorConfig, RunOutcome, RunReport};
pub use validation::{ResourceCheck, SchemaValidator, ValidationFinding, ValidationResult};
