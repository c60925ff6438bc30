//! Run orchestrator: rows × steps with pause/resume/stop control

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use rand::Rng;
use rehearse_core_types::{Step, StepStatus};
use rehearse_dom::Transport;
use rehearse_step::{StepContext, StepResult, StepRunner};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::errors::RunError;
use crate::state::{ProgressReport, RunState, RunStatus};
use crate::types::{LogLevel, RowObserver, RowResult, RunConfig, RunExport, RunLogEntry};

/// Owner of run-level state and iteration order.
///
/// One orchestrator drives one document at a time. Steps within a row
/// and rows themselves execute strictly sequentially; counters are
/// mutated only from the orchestration loop itself. Control methods
/// (`pause`/`resume`/`stop`/`reset`) are safe to call from any task.
pub struct RunOrchestrator {
    runner: Arc<dyn StepRunner>,
    transport: Arc<dyn Transport>,
    config: RunConfig,
    observer: Option<Arc<dyn RowObserver>>,

    state: RwLock<RunState>,
    paused: AtomicBool,
    stop_token: RwLock<CancellationToken>,
    step_results: RwLock<Vec<StepResult>>,
    row_results: RwLock<Vec<RowResult>>,
    logs: RwLock<Vec<RunLogEntry>>,
}

impl RunOrchestrator {
    pub fn new(
        runner: Arc<dyn StepRunner>,
        transport: Arc<dyn Transport>,
        config: RunConfig,
    ) -> Self {
        Self {
            runner,
            transport,
            config,
            observer: None,
            state: RwLock::new(RunState::fresh()),
            paused: AtomicBool::new(false),
            stop_token: RwLock::new(CancellationToken::new()),
            step_results: RwLock::new(Vec::new()),
            row_results: RwLock::new(Vec::new()),
            logs: RwLock::new(Vec::new()),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RowObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Execute every step across every data row (or one synthetic empty
    /// row when no data is supplied) and return the structured export.
    ///
    /// Returns an error only when the run cannot start; once underway,
    /// step failures are counters and results, never errors.
    pub async fn run(
        &self,
        steps: Vec<Step>,
        rows: Vec<HashMap<String, String>>,
        mappings: HashMap<String, String>,
    ) -> Result<RunExport, RunError> {
        {
            let mut state = self.state.write();
            if state.status.is_active() {
                return Err(RunError::AlreadyActive(state.status));
            }
            *state = RunState::fresh();
            state.status = RunStatus::Preparing;
        }
        self.step_results.write().clear();
        self.row_results.write().clear();
        self.logs.write().clear();
        self.paused.store(false, Ordering::SeqCst);
        let stop = CancellationToken::new();
        *self.stop_token.write() = stop.clone();

        if steps.is_empty() {
            self.state.write().status = RunStatus::Failed;
            self.log(LogLevel::Error, "cannot start: recording has no steps", None, None);
            return Err(RunError::NoSteps);
        }
        if !self.transport.is_available() {
            self.state.write().status = RunStatus::Failed;
            self.log(LogLevel::Error, "cannot start: transport unavailable", None, None);
            return Err(RunError::TransportUnavailable);
        }

        let total_rows = rows.len().max(1);
        let run_id = {
            let mut state = self.state.write();
            state.total_rows = total_rows;
            state.total_steps = steps.len();
            state.total_units = steps.len() * total_rows;
            state.started_at = Some(Utc::now());
            state.status = RunStatus::Running;
            state.run_id.clone()
        };
        info!(
            run_id = %run_id,
            steps = steps.len(),
            rows = total_rows,
            "run started"
        );
        self.log(
            LogLevel::Info,
            format!("run started: {} steps × {} rows", steps.len(), total_rows),
            None,
            None,
        );

        let mut halted = false;
        'rows: for row_index in 0..total_rows {
            let row_values = rows.get(row_index);

            for (step_index, step) in steps.iter().enumerate() {
                // Pause and stop are honored before every step.
                if !self.checkpoint(&stop).await {
                    halted = true;
                    break 'rows;
                }
                if self.state.read().completed_units > 0
                    && !self.inter_step_delay(&stop).await
                {
                    halted = true;
                    break 'rows;
                }

                {
                    let mut state = self.state.write();
                    state.current_row = row_index;
                    state.current_step = step_index;
                }

                let ctx = match row_values {
                    Some(values) => {
                        StepContext::for_row(row_index, values.clone(), mappings.clone())
                    }
                    None => StepContext::default(),
                };

                let result = self
                    .runner
                    .execute(step, step_index, &ctx, &self.config.step, &stop)
                    .await;

                // A step cut short by a stop request never really ran;
                // its result is discarded rather than counted.
                if stop.is_cancelled() && result.is_failed() {
                    self.log(
                        LogLevel::Info,
                        "step aborted by stop request; result discarded",
                        Some(step_index),
                        ctx.row_index,
                    );
                    halted = true;
                    break 'rows;
                }

                let failed = result.is_failed();
                self.record_step(result);

                if failed && self.config.stop_on_error {
                    warn!(step_index, row_index, "stop-on-error: halting run");
                    self.log(
                        LogLevel::Warn,
                        "stop-on-error: halting run after failed step",
                        Some(step_index),
                        ctx.row_index,
                    );
                    halted = true;
                    break 'rows;
                }
            }

            let row_result = self.fold_row(row_index, row_values.is_some());
            self.log(
                LogLevel::Info,
                format!("row {} finished: {}", row_index, row_result.status),
                None,
                Some(row_index),
            );
            self.row_results.write().push(row_result.clone());
            if let Some(observer) = &self.observer {
                observer.on_row_complete(&row_result).await;
            }
        }

        let final_status = if halted || stop.is_cancelled() {
            RunStatus::Stopped
        } else {
            RunStatus::Completed
        };
        {
            let mut state = self.state.write();
            // A reset mid-run already put the machine back to idle.
            if state.status.is_active() {
                state.status = final_status;
                state.finished_at = Some(Utc::now());
            }
        }
        let state = self.snapshot();
        info!(
            run_id = %state.run_id,
            status = %state.status,
            passed = state.passed,
            failed = state.failed,
            skipped = state.skipped,
            duration_ms = state.duration_ms(),
            "run finished"
        );
        self.log(
            LogLevel::Info,
            format!(
                "run {}: {} passed, {} failed, {} skipped",
                state.status, state.passed, state.failed, state.skipped
            ),
            None,
            None,
        );

        Ok(self.export())
    }

    /// Suspend progression between steps while paused.
    ///
    /// Returns `false` when a stop request ended the wait; a stop issued
    /// while paused is honored without resuming.
    async fn checkpoint(&self, stop: &CancellationToken) -> bool {
        loop {
            if stop.is_cancelled() {
                return false;
            }
            if !self.paused.load(Ordering::SeqCst) {
                return true;
            }
            tokio::select! {
                _ = stop.cancelled() => return false,
                _ = sleep(self.config.pause_poll) => {}
            }
        }
    }

    async fn inter_step_delay(&self, stop: &CancellationToken) -> bool {
        let delay = self.sample_delay();
        if delay.is_zero() {
            return true;
        }
        tokio::select! {
            _ = stop.cancelled() => false,
            _ = sleep(delay) => true,
        }
    }

    /// `base + U(0, base × jitter)`, scaled by the playback speed.
    fn sample_delay(&self) -> Duration {
        let base = self.config.base_delay;
        if base.is_zero() {
            return Duration::ZERO;
        }
        let jitter_factor = self.config.jitter_factor.max(0.0);
        let jitter = base.mul_f64(rand::thread_rng().gen_range(0.0..=jitter_factor));
        let speed = if self.config.playback_speed > 0.0 {
            self.config.playback_speed
        } else {
            1.0
        };
        (base + jitter).div_f64(speed)
    }

    /// The single place run counters are mutated. Skip takes precedence
    /// over fail: a skipped step never increments the failure counter.
    fn record_step(&self, result: StepResult) {
        {
            let mut state = self.state.write();
            match result.status {
                StepStatus::Passed => state.passed += 1,
                StepStatus::Failed => state.failed += 1,
                StepStatus::Skipped => state.skipped += 1,
            }
            state.completed_units += 1;
        }

        let level = match result.status {
            StepStatus::Passed => LogLevel::Info,
            StepStatus::Failed => LogLevel::Error,
            StepStatus::Skipped => LogLevel::Warn,
        };
        let mut message = format!(
            "step '{}' {} in {}ms",
            result.label, result.status, result.duration_ms
        );
        if let Some(error) = &result.error {
            message.push_str(": ");
            message.push_str(error);
        }
        self.log(level, message, Some(result.step_index), result.row_index);

        self.step_results.write().push(result);
    }

    fn fold_row(&self, row_index: usize, has_data: bool) -> RowResult {
        let results = self.step_results.read();
        let row_key = has_data.then_some(row_index);
        let of_row: Vec<&StepResult> = results
            .iter()
            .filter(|r| r.row_index == row_key)
            .collect();
        RowResult::from_steps(row_index, &of_row)
    }

    fn log(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        step_index: Option<usize>,
        row_index: Option<usize>,
    ) {
        self.logs
            .write()
            .push(RunLogEntry::new(level, message).at(step_index, row_index));
    }

    /// Suspend progression after the current step completes.
    pub fn pause(&self) {
        let should_log = {
            let mut state = self.state.write();
            if state.status == RunStatus::Running {
                state.status = RunStatus::Paused;
                self.paused.store(true, Ordering::SeqCst);
                true
            } else {
                false
            }
        };
        if should_log {
            info!("run paused");
            self.log(LogLevel::Info, "run paused", None, None);
        }
    }

    /// Resume a paused run.
    pub fn resume(&self) {
        let should_log = {
            let mut state = self.state.write();
            if state.status == RunStatus::Paused {
                state.status = RunStatus::Running;
                self.paused.store(false, Ordering::SeqCst);
                true
            } else {
                false
            }
        };
        if should_log {
            info!("run resumed");
            self.log(LogLevel::Info, "run resumed", None, None);
        }
    }

    /// Request a stop. Takes effect at the next checkpoint; in-flight
    /// waits observe the signal and return immediately.
    pub fn stop(&self) {
        let should_cancel = {
            let mut state = self.state.write();
            if state.status.is_active() {
                state.status = RunStatus::Stopping;
                true
            } else {
                false
            }
        };
        if should_cancel {
            self.paused.store(false, Ordering::SeqCst);
            self.stop_token.read().cancel();
            info!("stop requested");
            self.log(LogLevel::Info, "stop requested", None, None);
        }
    }

    /// Return unconditionally to idle, clearing counters, logs and
    /// results. Any in-flight run is cancelled.
    pub fn reset(&self) {
        self.stop_token.read().cancel();
        self.paused.store(false, Ordering::SeqCst);
        *self.state.write() = RunState::fresh();
        self.step_results.write().clear();
        self.row_results.write().clear();
        self.logs.write().clear();
        info!("orchestrator reset");
    }

    /// Read-only view of the current run state.
    pub fn snapshot(&self) -> RunState {
        self.state.read().clone()
    }

    pub fn progress(&self) -> ProgressReport {
        ProgressReport::from_state(&self.state.read())
    }

    pub fn step_results(&self) -> Vec<StepResult> {
        self.step_results.read().clone()
    }

    pub fn row_results(&self) -> Vec<RowResult> {
        self.row_results.read().clone()
    }

    pub fn logs(&self) -> Vec<RunLogEntry> {
        self.logs.read().clone()
    }

    /// Structured export for the external persistence collaborator.
    pub fn export(&self) -> RunExport {
        let state = self.snapshot();
        RunExport {
            run_id: state.run_id.clone(),
            project_id: self.config.project_id.clone(),
            status: state.status,
            started_at: state.started_at,
            finished_at: state.finished_at,
            duration_ms: state.duration_ms(),
            passed: state.passed,
            failed: state.failed,
            skipped: state.skipped,
            step_results: self.step_results(),
            row_results: self.row_results(),
            logs: self.logs(),
        }
    }
}
