//! Generation orchestration
//!
//! One run per request: generate an artifact, validate it, and feed the
//! findings back as a repair prompt until it passes or the iteration
//! budget is spent.

mod engine;
mod run;

pub use engine::{FallbackPolicy, GenerationOrchestrator, OrchestratorConfig};
pub use run::{GenerationAttempt, OrchestrationRun, RunOutcome, RunReport, RunState};
