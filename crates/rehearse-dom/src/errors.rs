//! Error types for the collaborator boundary

use thiserror::Error;

/// Errors surfaced by a document collaborator.
#[derive(Debug, Error, Clone)]
pub enum DomError {
    /// Selector could not be parsed by the document engine
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// Node handle no longer refers to an attached node
    #[error("Node detached: {0}")]
    NodeDetached(String),

    /// Communication with the document failed
    #[error("Document I/O error: {0}")]
    Io(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors surfaced by the action transport.
#[derive(Debug, Error, Clone)]
pub enum TransportError {
    /// No channel to the execution context that owns the document
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    /// The action was dispatched but no reply arrived in time
    #[error("Transport timeout after {0}ms")]
    Timeout(u64),

    /// The remote side reported a failure
    #[error("Action dispatch failed: {0}")]
    Failed(String),
}

impl TransportError {
    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}
