//! Prompt Templates
//!
//! Loads and renders `.pmt` (prompt template) files.
//!
//! Template loading chain:
//! 1. `{prompts-dir}/{name}.pmt` (configured override directory)
//! 2. Embedded fallback compiled into the binary
//!
//! Templates use Handlebars syntax for variable substitution. The repair
//! prompt is built in code so that it stays a pure, infallible function.

pub mod embedded;
mod history;
mod loader;
mod repair;

pub use history::{HistoryWindow, format_history};
pub use loader::{GenerationPromptContext, PromptLoader};
pub use repair::build_fix_prompt;
