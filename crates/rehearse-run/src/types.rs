//! Run configuration, per-row aggregates, logs and the export object

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rehearse_core_types::{ProjectId, RunId, StepStatus};
use rehearse_step::{StepOptions, StepResult};
use serde::{Deserialize, Serialize};

use crate::state::RunStatus;

/// Tuning knobs for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Halt the entire run on the first failed step
    pub stop_on_error: bool,

    /// Base inter-step delay; the actual delay is
    /// `base + U(0, base × jitter_factor)`, divided by `playback_speed`
    pub base_delay: Duration,

    /// Upper bound of the uniform jitter, as a fraction of `base_delay`
    pub jitter_factor: f64,

    /// Pacing divisor; 2.0 replays twice as fast
    pub playback_speed: f64,

    /// Granularity of the pause/stop checkpoint
    pub pause_poll: Duration,

    /// Per-step execution options
    pub step: StepOptions,

    /// Project this run reports under
    pub project_id: Option<ProjectId>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            stop_on_error: false,
            base_delay: Duration::from_millis(300),
            jitter_factor: 0.3,
            playback_speed: 1.0,
            pause_poll: Duration::from_millis(100),
            step: StepOptions::default(),
            project_id: None,
        }
    }
}

impl RunConfig {
    pub fn stop_on_error(mut self) -> Self {
        self.stop_on_error = true;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_playback_speed(mut self, speed: f64) -> Self {
        self.playback_speed = speed;
        self
    }

    pub fn with_step_options(mut self, step: StepOptions) -> Self {
        self.step = step;
        self
    }

    pub fn with_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }
}

/// Aggregate of all step results for one data row.
///
/// Created once every step in the row has been attempted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowResult {
    pub row_index: usize,
    pub status: StepStatus,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
}

impl RowResult {
    /// Fold one row's step results into an aggregate. A row fails when
    /// any step failed; a row whose steps were all skipped is skipped.
    pub fn from_steps(row_index: usize, steps: &[&StepResult]) -> Self {
        let passed = steps.iter().filter(|s| s.is_passed()).count();
        let failed = steps.iter().filter(|s| s.is_failed()).count();
        let skipped = steps.iter().filter(|s| s.is_skipped()).count();
        let duration_ms = steps.iter().map(|s| s.duration_ms).sum();

        let status = if failed > 0 {
            StepStatus::Failed
        } else if passed == 0 && skipped > 0 {
            StepStatus::Skipped
        } else {
            StepStatus::Passed
        };

        Self {
            row_index,
            status,
            passed,
            failed,
            skipped,
            duration_ms,
        }
    }
}

/// Severity of a run log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One entry in the run's in-memory log, included in the export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogEntry {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub step_index: Option<usize>,
    pub row_index: Option<usize>,
}

impl RunLogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            step_index: None,
            row_index: None,
        }
    }

    pub fn at(mut self, step_index: Option<usize>, row_index: Option<usize>) -> Self {
        self.step_index = step_index;
        self.row_index = row_index;
        self
    }
}

/// Structured export handed to the external persistence/reporting
/// collaborator. The core never persists anything itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunExport {
    pub run_id: RunId,
    pub project_id: Option<ProjectId>,
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub step_results: Vec<StepResult>,
    pub row_results: Vec<RowResult>,
    pub logs: Vec<RunLogEntry>,
}

/// Callback invoked after each completed data row.
#[async_trait]
pub trait RowObserver: Send + Sync {
    async fn on_row_complete(&self, row: &RowResult);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rehearse_core_types::EventType;
    use rehearse_step::PhaseTimings;

    fn step_result(status: StepStatus) -> StepResult {
        StepResult {
            step_index: 0,
            label: "step".to_string(),
            event: EventType::Click,
            row_index: Some(0),
            status,
            duration_ms: 10,
            error: None,
            timestamp: Utc::now(),
            strategy: None,
            value_source: None,
            timings: PhaseTimings::default(),
        }
    }

    #[test]
    fn row_fails_when_any_step_failed() {
        let steps = [step_result(StepStatus::Passed), step_result(StepStatus::Failed)];
        let refs: Vec<&StepResult> = steps.iter().collect();
        let row = RowResult::from_steps(0, &refs);
        assert_eq!(row.status, StepStatus::Failed);
        assert_eq!(row.passed, 1);
        assert_eq!(row.failed, 1);
    }

    #[test]
    fn all_skipped_row_is_skipped_not_failed() {
        let steps = [step_result(StepStatus::Skipped), step_result(StepStatus::Skipped)];
        let refs: Vec<&StepResult> = steps.iter().collect();
        let row = RowResult::from_steps(1, &refs);
        assert_eq!(row.status, StepStatus::Skipped);
        assert_eq!(row.failed, 0);
    }

    #[test]
    fn mixed_pass_and_skip_still_passes() {
        let steps = [step_result(StepStatus::Passed), step_result(StepStatus::Skipped)];
        let refs: Vec<&StepResult> = steps.iter().collect();
        let row = RowResult::from_steps(2, &refs);
        assert_eq!(row.status, StepStatus::Passed);
    }
}
