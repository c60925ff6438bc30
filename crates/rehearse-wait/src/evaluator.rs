//! Polling wait evaluator

use std::sync::Arc;
use std::time::{Duration, Instant};

use rehearse_dom::{BoundingBox, DocumentView, NodeHandle};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::conditions::{evaluate, WaitCondition};
use crate::errors::WaitError;
use crate::types::{WaitOptions, WaitResult, WaitVerdict};

/// Stateless, reentrant condition poller over one document view.
///
/// Safe to share across concurrent callers; every call carries its own
/// budget and cancellation token.
pub struct WaitEvaluator {
    document: Arc<dyn DocumentView>,
}

impl WaitEvaluator {
    pub fn new(document: Arc<dyn DocumentView>) -> Self {
        Self { document }
    }

    /// Poll until `condition` holds on `target`, the budget elapses, or
    /// `cancel` fires.
    ///
    /// The first poll runs immediately. After an abort or an exhausted
    /// budget no further evaluation happens. Timeout is an error only
    /// when `opts.fail_on_timeout` is set; an abort always returns an
    /// unsatisfied result instead of an error.
    pub async fn wait_for(
        &self,
        target: &NodeHandle,
        condition: &WaitCondition,
        opts: &WaitOptions,
        cancel: &CancellationToken,
    ) -> Result<WaitResult, WaitError> {
        self.run_loop(target, std::slice::from_ref(condition), Mode::Single, opts, cancel)
            .await
    }

    /// Poll until every condition holds at once.
    pub async fn wait_for_all(
        &self,
        target: &NodeHandle,
        conditions: &[WaitCondition],
        opts: &WaitOptions,
        cancel: &CancellationToken,
    ) -> Result<WaitResult, WaitError> {
        self.run_loop(target, conditions, Mode::All, opts, cancel).await
    }

    /// Poll until any condition holds; the result reports which one.
    pub async fn wait_for_any(
        &self,
        target: &NodeHandle,
        conditions: &[WaitCondition],
        opts: &WaitOptions,
        cancel: &CancellationToken,
    ) -> Result<WaitResult, WaitError> {
        self.run_loop(target, conditions, Mode::Any, opts, cancel).await
    }

    async fn run_loop(
        &self,
        target: &NodeHandle,
        conditions: &[WaitCondition],
        mode: Mode,
        opts: &WaitOptions,
        cancel: &CancellationToken,
    ) -> Result<WaitResult, WaitError> {
        let start = Instant::now();
        let mut polls: u32 = 0;
        let mut box_history: Vec<Option<BoundingBox>> = Vec::new();
        let mut seen_node = false;

        // Stability samples are spaced by their own threshold.
        let interval = conditions
            .iter()
            .find_map(|c| c.stable_threshold_ms())
            .map(Duration::from_millis)
            .unwrap_or(opts.poll_interval)
            .max(Duration::from_millis(1));

        loop {
            if cancel.is_cancelled() {
                debug!(node = %target, polls, "wait aborted");
                return Ok(WaitResult::aborted(
                    seen_node.then(|| target.clone()),
                    polls,
                    start.elapsed().as_millis() as u64,
                ));
            }
            if polls > 0 && start.elapsed() >= opts.timeout {
                break;
            }

            let snapshot = self
                .document
                .snapshot(target)
                .await
                .map_err(|e| WaitError::DocumentError(e.to_string()))?;
            seen_node |= snapshot.is_some();
            box_history.push(snapshot.as_ref().and_then(|s| s.bounding_box));
            polls += 1;

            let satisfied_index = match mode {
                Mode::Single | Mode::All => conditions
                    .iter()
                    .all(|c| evaluate(c, snapshot.as_ref(), &box_history))
                    .then_some(0),
                Mode::Any => conditions
                    .iter()
                    .position(|c| evaluate(c, snapshot.as_ref(), &box_history)),
            };

            if let Some(index) = satisfied_index {
                let mut result = WaitResult::satisfied(
                    snapshot.map(|s| s.handle),
                    polls,
                    start.elapsed().as_millis() as u64,
                );
                if matches!(mode, Mode::Any) {
                    result = result.with_satisfied_index(index);
                }
                return Ok(result);
            }

            let remaining = opts.timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            let nap = interval.min(remaining);
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(node = %target, polls, "wait aborted during sleep");
                    return Ok(WaitResult::aborted(
                        seen_node.then(|| target.clone()),
                        polls,
                        start.elapsed().as_millis() as u64,
                    ));
                }
                _ = sleep(nap) => {}
            }
        }

        let elapsed_ms = start.elapsed().as_millis() as u64;
        debug!(node = %target, polls, elapsed_ms, "wait timed out");
        if opts.fail_on_timeout {
            Err(WaitError::Timeout {
                waited_ms: elapsed_ms,
                polls,
            })
        } else {
            Ok(WaitResult::timed_out(
                seen_node.then(|| target.clone()),
                polls,
                elapsed_ms,
            ))
        }
    }
}

#[derive(Clone, Copy)]
enum Mode {
    Single,
    All,
    Any,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rehearse_dom::{BoundingBox, MemoryDocument, NodeSpec};

    fn evaluator_with(doc: Arc<MemoryDocument>) -> WaitEvaluator {
        WaitEvaluator::new(doc)
    }

    fn quick_opts(timeout_ms: u64, interval_ms: u64) -> WaitOptions {
        WaitOptions::default()
            .with_timeout(Duration::from_millis(timeout_ms))
            .with_poll_interval(Duration::from_millis(interval_ms))
    }

    #[tokio::test]
    async fn already_satisfied_resolves_on_first_poll() {
        let doc = Arc::new(MemoryDocument::new());
        let handle = doc.insert(NodeSpec::new("n", "button").with_text("Ready"));
        let evaluator = evaluator_with(doc);

        let result = evaluator
            .wait_for(
                &handle,
                &WaitCondition::Visible,
                &quick_opts(5_000, 100),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(result.satisfied);
        assert_eq!(result.polls, 1);
        assert!(result.elapsed_ms < 50, "elapsed {}ms", result.elapsed_ms);
    }

    #[tokio::test]
    async fn poll_count_tracks_timeout_over_interval() {
        let doc = Arc::new(MemoryDocument::new());
        let handle = doc.insert(NodeSpec::new("n", "div"));
        let evaluator = evaluator_with(doc);

        // 300ms / 50ms: about 6 polls, give or take scheduler jitter.
        let result = evaluator
            .wait_for(
                &handle,
                &WaitCondition::HasText("never".to_string()),
                &quick_opts(300, 50).tolerate_timeout(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(!result.satisfied);
        assert_eq!(result.verdict, WaitVerdict::TimedOut);
        assert!(
            (4..=8).contains(&result.polls),
            "polls {} outside tolerance",
            result.polls
        );
    }

    #[tokio::test]
    async fn timeout_is_an_error_by_default() {
        let doc = Arc::new(MemoryDocument::new());
        let handle = doc.insert(NodeSpec::new("n", "div"));
        let evaluator = evaluator_with(doc);

        let err = evaluator
            .wait_for(
                &handle,
                &WaitCondition::HasText("never".to_string()),
                &quick_opts(120, 40),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::Timeout { .. }));
    }

    #[tokio::test]
    async fn abort_stops_polling_immediately() {
        let doc = Arc::new(MemoryDocument::new());
        let handle = doc.insert(NodeSpec::new("n", "div"));
        let evaluator = evaluator_with(doc);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(80)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let result = evaluator
            .wait_for(
                &handle,
                &WaitCondition::HasText("never".to_string()),
                &quick_opts(10_000, 50),
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(result.verdict, WaitVerdict::Aborted);
        assert!(!result.satisfied);
        assert!(
            start.elapsed() < Duration::from_millis(1_000),
            "abort did not cut the wait short"
        );
    }

    #[tokio::test]
    async fn condition_becoming_true_is_observed() {
        let doc = Arc::new(MemoryDocument::new());
        let handle = doc.insert(NodeSpec::new("status", "span"));
        let evaluator = evaluator_with(doc.clone());

        tokio::spawn(async move {
            sleep(Duration::from_millis(120)).await;
            doc.set_text("status", "saved");
        });

        let result = evaluator
            .wait_for(
                &handle,
                &WaitCondition::HasText("saved".to_string()),
                &quick_opts(5_000, 30),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(result.satisfied);
        assert!(result.polls > 1);
    }

    #[tokio::test]
    async fn any_reports_which_condition_won() {
        let doc = Arc::new(MemoryDocument::new());
        let handle = doc.insert(NodeSpec::new("n", "input").with_value("ready"));
        let evaluator = evaluator_with(doc);

        let result = evaluator
            .wait_for_any(
                &handle,
                &[
                    WaitCondition::Disabled,
                    WaitCondition::HasValue("ready".to_string()),
                ],
                &quick_opts(1_000, 50),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(result.satisfied);
        assert_eq!(result.satisfied_index, Some(1));
    }

    #[tokio::test]
    async fn stability_waits_for_quiet_layout() {
        let doc = Arc::new(MemoryDocument::new());
        let handle = doc.insert(NodeSpec::new("panel", "div"));
        let evaluator = evaluator_with(doc.clone());

        // Wobble the layout for a while, then settle.
        let wobbler = doc.clone();
        tokio::spawn(async move {
            for width in 0..6u32 {
                wobbler.set_bounding_box(
                    "panel",
                    Some(BoundingBox {
                        x: 0.0,
                        y: 0.0,
                        width: 100.0 + width as f64,
                        height: 20.0,
                    }),
                );
                sleep(Duration::from_millis(25)).await;
            }
        });

        let result = evaluator
            .wait_for(
                &handle,
                &WaitCondition::Stable {
                    threshold_ms: 25,
                    samples: 3,
                },
                &quick_opts(5_000, 100),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(result.satisfied);
        assert!(result.polls >= 3);
    }
}
