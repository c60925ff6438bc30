//! Error types for the wait evaluator

use thiserror::Error;

/// Wait failure enumeration.
///
/// An aborted wait is NOT an error; it returns an unsatisfied
/// [`crate::WaitResult`] regardless of the timeout policy.
#[derive(Debug, Error, Clone)]
pub enum WaitError {
    /// Condition never held within the budget
    #[error("Wait timed out after {waited_ms}ms ({polls} polls)")]
    Timeout { waited_ms: u64, polls: u32 },

    /// Document communication failed mid-poll
    #[error("Document error during wait: {0}")]
    DocumentError(String),
}

impl WaitError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }
}
