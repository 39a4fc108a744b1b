//! Artifact validation
//!
//! Turns artifact text plus domain metadata into an ordered list of
//! findings. Findings are data for the repair loop, never errors.

mod finding;
mod validator;

pub use finding::{Category, Severity, ValidationFinding, ValidationResult};
pub use validator::{ResourceCheck, SchemaValidator};
