//! Transport collaborator trait

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::TransportError;
use crate::types::NodeHandle;

/// Concrete action to dispatch into the execution context owning the
/// document. The sequencing inside each variant is the transport's job;
/// the replay core only decides *which* action runs on *which* node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionDescriptor {
    /// Synthetic pointer-down / pointer-up / click sequence
    Click,

    /// Focus, clear, then fire input + change notifications for a value
    /// that was already written through the bypass setter
    Input { value: String },

    /// Key-down / key-press / key-up triple for the Enter key; also fire
    /// a submit when the element sits inside a form
    PressEnter { submit_form: bool },
}

impl ActionDescriptor {
    pub fn name(&self) -> &'static str {
        match self {
            ActionDescriptor::Click => "click",
            ActionDescriptor::Input { .. } => "input",
            ActionDescriptor::PressEnter { .. } => "press-enter",
        }
    }
}

/// Structured reply from an action dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Whether the remote side reports success
    pub ok: bool,

    /// Optional structured detail from the remote side
    pub detail: Option<serde_json::Value>,
}

impl ActionOutcome {
    pub fn ok() -> Self {
        Self {
            ok: true,
            detail: None,
        }
    }

    pub fn failed(detail: serde_json::Value) -> Self {
        Self {
            ok: false,
            detail: Some(detail),
        }
    }
}

/// Cross-context dispatch channel for actions.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dispatch one action and wait for the structured reply, up to
    /// `timeout`.
    async fn send(
        &self,
        target: &NodeHandle,
        action: &ActionDescriptor,
        timeout: Duration,
    ) -> Result<ActionOutcome, TransportError>;

    /// Whether a channel to the document's execution context exists right
    /// now. Unavailability fails every step that needs a dispatch.
    fn is_available(&self) -> bool;
}
