//! Error types for step execution

use thiserror::Error;

/// Step execution errors.
///
/// These never cross the executor boundary as errors; [`crate::executor`]
/// converts each into a failed step result. The variants mirror the
/// failure taxonomy the orchestrator's policies act on.
#[derive(Debug, Error, Clone)]
pub enum StepError {
    /// Malformed step; fails fast, never retried
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Element not found within the find budget
    #[error("Element '{label}' not found within {waited_ms}ms")]
    LocateTimeout { label: String, waited_ms: u64 },

    /// Readiness condition never satisfied
    #[error("Wait failed: {0}")]
    Wait(String),

    /// Transport dispatched the action but it did not succeed
    #[error("Action failed: {0}")]
    ActionFailed(String),

    /// No channel to dispatch the action; fatal to the step
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    /// Document collaborator failure
    #[error("Document error: {0}")]
    Document(String),

    /// Run was cancelled while the step was in flight
    #[error("Step aborted: {0}")]
    Aborted(String),
}

impl StepError {
    /// Check if this error is retryable by re-running the step.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StepError::LocateTimeout { .. } | StepError::Wait(_) | StepError::ActionFailed(_)
        )
    }
}
