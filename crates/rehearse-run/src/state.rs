//! Run-level state machine and progress accounting

use chrono::{DateTime, Utc};
use rehearse_core_types::RunId;
use serde::{Deserialize, Serialize};

/// Status of a run.
///
/// `Stopped` covers both user-initiated stops and the stop-on-error
/// policy; `Completed` means the run went to exhaustion regardless of
/// individual step failures; `Failed` is reserved for runs that could
/// not even start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Preparing,
    Running,
    Paused,
    Stopping,
    Completed,
    Failed,
    Stopped,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Preparing => "preparing",
            RunStatus::Running => "running",
            RunStatus::Paused => "paused",
            RunStatus::Stopping => "stopping",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Stopped => "stopped",
        }
    }

    /// Whether a run is currently in flight (or about to be).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RunStatus::Preparing | RunStatus::Running | RunStatus::Paused | RunStatus::Stopping
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Stopped
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestrator-owned run record.
///
/// Mutated only from the orchestration loop (plus the status flips the
/// control methods perform); everything callers get is a clone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: RunId,
    pub status: RunStatus,

    /// Row currently (or last) being executed
    pub current_row: usize,

    /// Step currently (or last) being executed within the row
    pub current_step: usize,

    /// Matrix bounds for this run
    pub total_rows: usize,
    pub total_steps: usize,

    /// Cumulative counters; skip and fail are mutually exclusive
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,

    /// Work units finished so far out of `total_units`
    pub completed_units: usize,
    pub total_units: usize,

    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunState {
    pub fn fresh() -> Self {
        Self {
            run_id: RunId::new(),
            status: RunStatus::Idle,
            current_row: 0,
            current_step: 0,
            total_rows: 0,
            total_steps: 0,
            passed: 0,
            failed: 0,
            skipped: 0,
            completed_units: 0,
            total_units: 0,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(finish)) => {
                (finish - start).num_milliseconds().max(0) as u64
            }
            (Some(start), None) => (Utc::now() - start).num_milliseconds().max(0) as u64,
            _ => 0,
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::fresh()
    }
}

/// Simple moving progress estimate; not statistically smoothed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressReport {
    /// Completed work units over the total, 0..=100
    pub percent: f64,

    pub completed: usize,
    pub total: usize,

    pub elapsed_ms: u64,

    /// `(elapsed / completed) × remaining`; absent before the first
    /// completed unit
    pub eta_ms: Option<u64>,
}

impl ProgressReport {
    pub fn from_state(state: &RunState) -> Self {
        let completed = state.completed_units;
        let total = state.total_units;
        let elapsed_ms = state.duration_ms();
        let percent = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64 * 100.0
        };
        let eta_ms = (completed > 0 && total > completed).then(|| {
            let per_unit = elapsed_ms as f64 / completed as f64;
            (per_unit * (total - completed) as f64) as u64
        });
        Self {
            percent,
            completed,
            total,
            elapsed_ms,
            eta_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(RunStatus::Running.is_active());
        assert!(RunStatus::Paused.is_active());
        assert!(RunStatus::Stopping.is_active());
        assert!(!RunStatus::Idle.is_active());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Stopped.is_terminal());
        assert!(!RunStatus::Paused.is_terminal());
    }

    #[test]
    fn progress_percent_and_eta() {
        let mut state = RunState::fresh();
        state.total_units = 8;
        state.completed_units = 2;
        state.started_at = Some(Utc::now() - chrono::Duration::milliseconds(400));

        let progress = ProgressReport::from_state(&state);
        assert!((progress.percent - 25.0).abs() < f64::EPSILON);
        let eta = progress.eta_ms.unwrap();
        // ~200ms per unit, 6 remaining.
        assert!((900..=2_000).contains(&eta), "eta {}ms", eta);
    }

    #[test]
    fn progress_with_nothing_done() {
        let mut state = RunState::fresh();
        state.total_units = 4;
        let progress = ProgressReport::from_state(&state);
        assert_eq!(progress.percent, 0.0);
        assert!(progress.eta_ms.is_none());
    }
}
