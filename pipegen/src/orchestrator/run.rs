//! OrchestrationRun domain type
//!
//! Tracks one generate/validate/repair run. Lives only as long as the
//! request that created it; nothing here is persisted.

use std::fmt;

use tracing::debug;
use uuid::Uuid;

use crate::llm::FailureKind;
use crate::validation::ValidationFinding;

/// Run state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Waiting on the gateway for iteration N
    Generating(u32),
    /// Validating the artifact of iteration N
    Validating(u32),
    /// Iteration N failed validation; the next prompt is a repair prompt
    Repairing(u32),
    /// An artifact passed validation
    Accepted,
    /// The iteration budget ran out
    Exhausted,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Exhausted)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generating(i) => write!(f, "generating({})", i),
            Self::Validating(i) => write!(f, "validating({})", i),
            Self::Repairing(i) => write!(f, "repairing({})", i),
            Self::Accepted => write!(f, "accepted"),
            Self::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// One call to the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationAttempt {
    /// 1-based iteration number
    pub iteration: u32,
    /// Model that produced the output, or the last model tried on failure
    pub model: String,
    pub prompt_sent: String,
    pub raw_output: Option<String>,
    /// Set when every model failed and the output (if any) is a fallback
    pub failure_reason: Option<FailureKind>,
}

/// Runtime record of one orchestration run
#[derive(Debug, Clone)]
pub struct OrchestrationRun {
    pub id: Uuid,
    pub state: RunState,
    pub attempts: Vec<GenerationAttempt>,
    /// Findings from the most recent validation pass
    pub findings: Vec<ValidationFinding>,
}

impl Default for OrchestrationRun {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestrationRun {
    pub fn new() -> Self {
        let id = Uuid::now_v7();
        debug!(%id, "OrchestrationRun::new: called");
        Self {
            id,
            state: RunState::Generating(1),
            attempts: Vec::new(),
            findings: Vec::new(),
        }
    }

    pub fn transition(&mut self, next: RunState) {
        debug!(run_id = %self.id, from = %self.state, to = %next, "OrchestrationRun::transition");
        self.state = next;
    }

    /// Iteration the run is on, or finished at
    pub fn iteration(&self) -> u32 {
        match self.state {
            RunState::Generating(i) | RunState::Validating(i) | RunState::Repairing(i) => i,
            RunState::Accepted | RunState::Exhausted => self.attempts.last().map(|a| a.iteration).unwrap_or(0),
        }
    }

    pub fn record_attempt(&mut self, attempt: GenerationAttempt) {
        debug!(
            run_id = %self.id,
            iteration = attempt.iteration,
            model = %attempt.model,
            failed = attempt.failure_reason.is_some(),
            "OrchestrationRun::record_attempt"
        );
        self.attempts.push(attempt);
    }

    /// Output of the most recent attempt that produced one
    pub fn last_artifact(&self) -> Option<&str> {
        self.attempts.iter().rev().find_map(|a| a.raw_output.as_deref())
    }
}

/// Terminal outcome of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// An artifact passed validation; warnings may remain
    Accepted {
        artifact: String,
        iterations: u32,
        warnings: Vec<ValidationFinding>,
    },
    /// No artifact passed within the iteration budget; needs manual review
    Exhausted {
        artifact: Option<String>,
        iterations: u32,
        findings: Vec<ValidationFinding>,
    },
    /// An unexpected failure ended the run
    Failed { error: String, iterations: u32 },
    /// The caller went away; no further events were sent
    Cancelled,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Final artifact text, if the run produced one
    pub fn artifact(&self) -> Option<&str> {
        match self {
            Self::Accepted { artifact, .. } => Some(artifact),
            Self::Exhausted { artifact, .. } => artifact.as_deref(),
            Self::Failed { .. } | Self::Cancelled => None,
        }
    }
}

/// What a finished run hands back to its owner
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run: OrchestrationRun,
    pub outcome: RunOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(iteration: u32, output: Option<&str>) -> GenerationAttempt {
        GenerationAttempt {
            iteration,
            model: "m".to_string(),
            prompt_sent: "p".to_string(),
            raw_output: output.map(str::to_string),
            failure_reason: None,
        }
    }

    #[test]
    fn test_new_run_starts_generating() {
        let run = OrchestrationRun::new();
        assert_eq!(run.state, RunState::Generating(1));
        assert_eq!(run.iteration(), 1);
        assert!(run.last_artifact().is_none());
    }

    #[test]
    fn test_iteration_follows_state() {
        let mut run = OrchestrationRun::new();
        run.record_attempt(attempt(1, Some("a")));
        run.transition(RunState::Repairing(1));
        run.transition(RunState::Generating(2));
        run.record_attempt(attempt(2, Some("b")));
        run.transition(RunState::Validating(2));
        assert_eq!(run.iteration(), 2);

        run.transition(RunState::Accepted);
        assert!(run.state.is_terminal());
        assert_eq!(run.iteration(), 2);
        assert_eq!(run.last_artifact(), Some("b"));
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(OrchestrationRun::new().id, OrchestrationRun::new().id);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(RunState::Repairing(3).to_string(), "repairing(3)");
        assert_eq!(RunState::Exhausted.to_string(), "exhausted");
    }
}
