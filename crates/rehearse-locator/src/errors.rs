//! Error types for the locator system

use thiserror::Error;

/// Locator error enumeration.
///
/// A bundle that simply matches nothing is NOT an error; `resolve`
/// answers `Ok(None)` for that. Errors are reserved for document-level
/// failures.
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// Bundle carries no usable locator information at all
    #[error("Empty locator bundle: {0}")]
    EmptyBundle(String),

    /// Strategy execution failed
    #[error("Strategy '{strategy}' failed: {reason}")]
    StrategyFailed { strategy: String, reason: String },

    /// Document communication error
    #[error("Document error: {0}")]
    DocumentError(String),
}

impl LocatorError {
    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LocatorError::DocumentError(_))
    }
}
