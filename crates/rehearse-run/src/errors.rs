//! Error types for run orchestration

use thiserror::Error;

use crate::state::RunStatus;

/// Failures that prevent a run from starting.
///
/// Once a run is underway nothing escapes as an error anymore; step
/// failures are data, not exceptions.
#[derive(Debug, Error, Clone)]
pub enum RunError {
    /// Recording carries no steps
    #[error("Cannot start: the recording has no steps")]
    NoSteps,

    /// No channel to the document's execution context
    #[error("Cannot start: transport unavailable")]
    TransportUnavailable,

    /// Another run is in flight on this orchestrator
    #[error("A run is already active (status: {0})")]
    AlreadyActive(RunStatus),
}
