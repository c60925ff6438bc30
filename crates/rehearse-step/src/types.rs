//! Step execution types

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rehearse_core_types::{EventType, StepStatus, ValueSource};
use rehearse_locator::StrategyKind;
use rehearse_wait::{WaitCondition, WaitOptions};
use serde::{Deserialize, Serialize};

/// Default budget for finding the element before acting.
pub const DEFAULT_FIND_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Default spacing between locate retries.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(120);

/// Tuning knobs for one step execution.
#[derive(Debug, Clone)]
pub struct StepOptions {
    /// Budget for the locate phase
    pub find_timeout: Duration,

    /// Spacing between locate retries
    pub retry_interval: Duration,

    /// Report `skipped` instead of `failed` when the element never
    /// appears within the find budget
    pub skip_on_not_found: bool,

    /// Budget for one transport dispatch
    pub action_timeout: Duration,

    /// Additional readiness condition to wait for after locating
    pub extra_condition: Option<WaitCondition>,

    /// Options for the extra-condition wait
    pub wait: WaitOptions,

    /// Delay before a visibility override is rolled back
    pub restore_delay: Duration,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            find_timeout: DEFAULT_FIND_TIMEOUT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            skip_on_not_found: false,
            action_timeout: Duration::from_millis(5_000),
            extra_condition: None,
            wait: WaitOptions::default(),
            restore_delay: Duration::from_millis(200),
        }
    }
}

impl StepOptions {
    pub fn with_find_timeout(mut self, timeout: Duration) -> Self {
        self.find_timeout = timeout;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn skip_on_not_found(mut self) -> Self {
        self.skip_on_not_found = true;
        self
    }

    pub fn with_extra_condition(mut self, condition: WaitCondition) -> Self {
        self.extra_condition = Some(condition);
        self
    }
}

/// Per-call execution context: the data row, the mapping table, and any
/// explicitly injected value. All read-only.
#[derive(Debug, Clone, Default)]
pub struct StepContext {
    /// Data row index this execution belongs to (none for a bare run)
    pub row_index: Option<usize>,

    /// Row dictionary, column name to value
    pub row_values: Option<HashMap<String, String>>,

    /// Field-mapping table, column name to step label
    pub field_mappings: Option<HashMap<String, String>>,

    /// Value injected explicitly for this call; wins over everything
    pub injected_value: Option<String>,

    /// Page URL the run is working against (informational)
    pub page_url: Option<String>,
}

impl StepContext {
    pub fn for_row(
        row_index: usize,
        row_values: HashMap<String, String>,
        field_mappings: HashMap<String, String>,
    ) -> Self {
        Self {
            row_index: Some(row_index),
            row_values: Some(row_values),
            field_mappings: Some(field_mappings),
            injected_value: None,
            page_url: None,
        }
    }

    pub fn with_injected_value(mut self, value: impl Into<String>) -> Self {
        self.injected_value = Some(value.into());
        self
    }
}

/// Wall time spent in each phase of the step lifecycle, milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PhaseTimings {
    pub validate_ms: u64,
    pub locate_ms: u64,
    pub wait_ms: u64,
    pub act_ms: u64,
    pub verify_ms: u64,
}

/// Outcome of one step execution.
///
/// Immutable; appended to the run-scoped result list, never edited in
/// place. Retries produce new results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// Index of the step within the recording
    pub step_index: usize,

    /// Human label of the step
    pub label: String,

    /// Recorded event type
    pub event: EventType,

    /// Data row this execution belonged to
    pub row_index: Option<usize>,

    /// Terminal status
    pub status: StepStatus,

    /// Total duration, milliseconds
    pub duration_ms: u64,

    /// Failure/skip detail, when any
    pub error: Option<String>,

    /// When the step finished
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Locator strategy that matched (absent when locate never succeeded)
    pub strategy: Option<StrategyKind>,

    /// Where the typed value came from (input/enter steps)
    pub value_source: Option<ValueSource>,

    /// Per-phase wall time
    pub timings: PhaseTimings,
}

impl StepResult {
    pub fn is_passed(&self) -> bool {
        self.status == StepStatus::Passed
    }

    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }

    pub fn is_skipped(&self) -> bool {
        self.status == StepStatus::Skipped
    }
}
