//! Step executor: validate → locate → wait → act → verify

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use rehearse_core_types::{EventType, Step, StepStatus, ValueSource};
use rehearse_dom::{DocumentView, Transport};
use rehearse_locator::{ElementResolver, FallbackResolver, StrategyKind};
use rehearse_wait::{WaitEvaluator, WaitVerdict};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::actions::perform_action;
use crate::errors::StepError;
use crate::types::{PhaseTimings, StepContext, StepOptions, StepResult};
use crate::values::resolve_value;

/// Driver of a single step execution.
///
/// Implementations never raise past this boundary; whatever happens
/// inside comes back as a [`StepResult`] with a status.
#[async_trait]
pub trait StepRunner: Send + Sync {
    async fn execute(
        &self,
        step: &Step,
        step_index: usize,
        ctx: &StepContext,
        opts: &StepOptions,
        cancel: &CancellationToken,
    ) -> StepResult;
}

/// Default step executor wiring the locator chain and wait evaluator to
/// the injected document and transport collaborators.
pub struct StepExecutor {
    document: Arc<dyn DocumentView>,
    transport: Arc<dyn Transport>,
    resolver: FallbackResolver,
    waiter: WaitEvaluator,
}

impl StepExecutor {
    pub fn new(document: Arc<dyn DocumentView>, transport: Arc<dyn Transport>) -> Self {
        let waiter = WaitEvaluator::new(document.clone());
        Self {
            document,
            transport,
            resolver: FallbackResolver::new(),
            waiter,
        }
    }

    async fn run(
        &self,
        step: &Step,
        ctx: &StepContext,
        opts: &StepOptions,
        cancel: &CancellationToken,
        timings: &mut PhaseTimings,
        strategy: &mut Option<StrategyKind>,
        value_source: &mut Option<ValueSource>,
    ) -> Result<Option<String>, StepError> {
        // validate: malformed steps fail fast and are never retried
        let phase = Instant::now();
        let checked = step.validate();
        timings.validate_ms = phase.elapsed().as_millis() as u64;
        checked.map_err(|e| StepError::Validation(e.to_string()))?;

        // open events auto-pass; navigation is verified by the external
        // page-load collaborator, not here
        if step.event == EventType::Open {
            return Ok(None);
        }

        if !self.transport.is_available() {
            return Err(StepError::TransportUnavailable(
                "no channel to the document context".to_string(),
            ));
        }

        // locate: re-poll the resolver within the find budget
        let phase = Instant::now();
        let resolution = loop {
            if cancel.is_cancelled() {
                timings.locate_ms = phase.elapsed().as_millis() as u64;
                return Err(StepError::Aborted("stop requested during locate".to_string()));
            }
            match self
                .resolver
                .resolve(&step.bundle, &step.path, self.document.as_ref())
                .await
            {
                Ok(Some(resolution)) => break Some(resolution),
                Ok(None) => {}
                Err(e) => {
                    // Resolver errors re-poll like a miss; the budget caps them.
                    debug!(step = %step.label, error = %e, "resolver error, re-polling");
                }
            }
            let remaining = opts.find_timeout.saturating_sub(phase.elapsed());
            if remaining.is_zero() {
                break None;
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    timings.locate_ms = phase.elapsed().as_millis() as u64;
                    return Err(StepError::Aborted("stop requested during locate".to_string()));
                }
                _ = tokio::time::sleep(opts.retry_interval.min(remaining)) => {}
            }
        };
        let waited_ms = phase.elapsed().as_millis() as u64;
        timings.locate_ms = waited_ms;

        let resolution = match resolution {
            Some(resolution) => resolution,
            None if opts.skip_on_not_found => {
                return Ok(Some(format!(
                    "element '{}' not found within {}ms",
                    step.label, waited_ms
                )));
            }
            None => {
                return Err(StepError::LocateTimeout {
                    label: step.label.clone(),
                    waited_ms,
                });
            }
        };
        *strategy = Some(resolution.strategy);

        // optional extra readiness condition
        if let Some(condition) = &opts.extra_condition {
            let phase = Instant::now();
            let outcome = self
                .waiter
                .wait_for(&resolution.handle, condition, &opts.wait, cancel)
                .await;
            timings.wait_ms = phase.elapsed().as_millis() as u64;
            match outcome {
                Ok(result) if result.satisfied => {}
                Ok(result) if result.verdict == WaitVerdict::Aborted => {
                    return Err(StepError::Aborted(
                        "stop requested during wait".to_string(),
                    ));
                }
                // Timeout with fail_on_timeout unset is tolerated.
                Ok(_) => {}
                Err(e) => return Err(StepError::Wait(e.to_string())),
            }
        }

        let resolved_value = if step.event.takes_value() {
            resolve_value(step, ctx)
        } else {
            None
        };
        *value_source = resolved_value.as_ref().map(|(_, source)| *source);

        // act
        let phase = Instant::now();
        perform_action(
            &self.document,
            &self.transport,
            &resolution.handle,
            step.event,
            resolved_value.as_ref().map(|(value, _)| value.as_str()),
            opts.action_timeout,
            opts.restore_delay,
        )
        .await?;
        timings.act_ms = phase.elapsed().as_millis() as u64;

        // verify: observe the side effect; a readback mismatch is worth
        // a warning but not a failure
        let phase = Instant::now();
        if let Ok(Some(after)) = self.document.snapshot(&resolution.handle).await {
            if step.event == EventType::Input {
                if let Some((expected, _)) = &resolved_value {
                    if after.value.as_deref() != Some(expected.as_str()) {
                        warn!(step = %step.label, "value readback differs from what was typed");
                    }
                }
            }
        }
        timings.verify_ms = phase.elapsed().as_millis() as u64;

        Ok(None)
    }
}

#[async_trait]
impl StepRunner for StepExecutor {
    async fn execute(
        &self,
        step: &Step,
        step_index: usize,
        ctx: &StepContext,
        opts: &StepOptions,
        cancel: &CancellationToken,
    ) -> StepResult {
        let started = Instant::now();
        let mut timings = PhaseTimings::default();
        let mut strategy = None;
        let mut value_source = None;

        let disposition = self
            .run(
                step,
                ctx,
                opts,
                cancel,
                &mut timings,
                &mut strategy,
                &mut value_source,
            )
            .await;

        let duration_ms = started.elapsed().as_millis() as u64;
        let (status, error) = match disposition {
            Ok(None) => {
                info!(
                    step_index,
                    row_index = ?ctx.row_index,
                    label = %step.label,
                    duration_ms,
                    "step passed"
                );
                (StepStatus::Passed, None)
            }
            Ok(Some(reason)) => {
                info!(
                    step_index,
                    row_index = ?ctx.row_index,
                    label = %step.label,
                    reason = %reason,
                    "step skipped"
                );
                (StepStatus::Skipped, Some(reason))
            }
            Err(e) => {
                warn!(
                    step_index,
                    row_index = ?ctx.row_index,
                    label = %step.label,
                    duration_ms,
                    error = %e,
                    "step failed"
                );
                (StepStatus::Failed, Some(e.to_string()))
            }
        };

        StepResult {
            step_index,
            label: step.label.clone(),
            event: step.event,
            row_index: ctx.row_index,
            status,
            duration_ms,
            error,
            timestamp: Utc::now(),
            strategy,
            value_source,
            timings,
        }
    }
}
