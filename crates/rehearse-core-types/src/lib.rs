//! Shared primitives for the rehearse replay engine
//!
//! Recorded steps, locator bundles, and the identifiers and status enums
//! every other crate in the workspace agrees on. Types here are produced
//! by the (external) recording pipeline and consumed read-only by the
//! replay core.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifier for one replay run.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for the project a run belongs to.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub String);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of recorded user interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Pointer click on an element
    Click,

    /// Text entry into an input or textarea
    Input,

    /// Enter key press (optionally submitting an enclosing form)
    Enter,

    /// Page open / navigation marker (replayed as an automatic pass)
    Open,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Click => "click",
            EventType::Input => "input",
            EventType::Enter => "enter",
            EventType::Open => "open",
        }
    }

    /// Whether this event consumes a substituted value during replay.
    pub fn takes_value(&self) -> bool {
        matches!(self, EventType::Input | EventType::Enter)
    }
}

/// Multi-strategy locator descriptor attached to a recorded step.
///
/// Any subset of fields may be empty; the resolver degrades gracefully
/// down to textual fallback when the stronger attributes are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorBundle {
    /// Element tag name (lowercase)
    pub tag: Option<String>,

    /// `id` attribute
    pub id: Option<String>,

    /// `name` attribute
    pub name: Option<String>,

    /// `placeholder` attribute
    pub placeholder: Option<String>,

    /// ARIA label (`aria-label` attribute)
    pub aria_label: Option<String>,

    /// Custom data-attributes (`data-*`), attribute name to value
    pub data_attributes: HashMap<String, String>,

    /// Visible text content at record time
    pub text: Option<String>,

    /// Structural path equivalent of the recorded element
    pub path: Option<String>,

    /// CSS-equivalent selector derived at record time
    pub css_selector: Option<String>,
}

impl LocatorBundle {
    /// True when no field carries usable locator information.
    pub fn is_empty(&self) -> bool {
        fn blank(v: &Option<String>) -> bool {
            v.as_deref().map_or(true, |s| s.trim().is_empty())
        }
        blank(&self.id)
            && blank(&self.name)
            && blank(&self.placeholder)
            && blank(&self.aria_label)
            && blank(&self.text)
            && blank(&self.path)
            && blank(&self.css_selector)
            && self.data_attributes.values().all(|v| v.trim().is_empty())
    }

    /// First populated custom data-attribute, in stable (sorted) order.
    pub fn first_data_attribute(&self) -> Option<(&str, &str)> {
        let mut keys: Vec<&String> = self
            .data_attributes
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, _)| k)
            .collect();
        keys.sort();
        keys.first().map(|k| {
            let v = &self.data_attributes[*k];
            (k.as_str(), v.as_str())
        })
    }
}

/// One recorded user interaction to replay.
///
/// Immutable once created; produced by the recording pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Recorded event type
    pub event: EventType,

    /// Structural path to the element at record time
    #[serde(default)]
    pub path: String,

    /// Multi-attribute locator descriptor
    #[serde(default)]
    pub bundle: LocatorBundle,

    /// Recorded value (input/enter events)
    #[serde(default)]
    pub value: Option<String>,

    /// Human-readable label (field caption, button text, ...)
    #[serde(default)]
    pub label: String,

    /// Recorded pointer x coordinate (informational only)
    #[serde(default)]
    pub x: f64,

    /// Recorded pointer y coordinate (informational only)
    #[serde(default)]
    pub y: f64,
}

impl Step {
    /// Check the step carries enough information to be replayed.
    ///
    /// Fails fast on steps with neither a locator bundle nor a structural
    /// path; such steps are never retried.
    pub fn validate(&self) -> Result<(), InvalidStep> {
        if self.bundle.is_empty() && self.path.trim().is_empty() {
            return Err(InvalidStep::NoLocator {
                label: self.label.clone(),
            });
        }
        Ok(())
    }
}

/// Validation failure for a recorded step.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvalidStep {
    /// Neither a locator bundle nor a structural path is present
    #[error("step '{label}' has no locator bundle and no structural path")]
    NoLocator { label: String },
}

/// Outcome status of one step execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Passed => "passed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the value typed during an input/enter step came from.
///
/// Reported on every step result for auditability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueSource {
    /// The originally recorded value
    Recorded,

    /// A CSV column whose name equals the step label
    CsvDirect,

    /// A CSV column reached through the field-mapping table
    CsvMapped,

    /// A value explicitly injected for this call
    Injected,
}

impl ValueSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueSource::Recorded => "recorded",
            ValueSource::CsvDirect => "csv-direct",
            ValueSource::CsvMapped => "csv-mapped",
            ValueSource::Injected => "injected",
        }
    }
}
