//! Wait options and results

use std::time::Duration;

use rehearse_dom::NodeHandle;
use serde::{Deserialize, Serialize};

/// Default overall wait budget.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Default spacing between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Tuning knobs for one wait call.
#[derive(Debug, Clone)]
pub struct WaitOptions {
    /// Overall budget before the wait gives up
    pub timeout: Duration,

    /// Spacing between polls (stability conditions use their own
    /// threshold as spacing instead)
    pub poll_interval: Duration,

    /// Whether an exhausted budget is an error or an unsatisfied result
    pub fail_on_timeout: bool,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_WAIT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            fail_on_timeout: true,
        }
    }
}

impl WaitOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn tolerate_timeout(mut self) -> Self {
        self.fail_on_timeout = false;
        self
    }
}

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitVerdict {
    /// The condition held
    Satisfied,

    /// The budget ran out first
    TimedOut,

    /// The cancellation signal fired first
    Aborted,
}

/// Outcome of one wait call. Produced fresh per call, never mutated
/// after return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitResult {
    /// Whether the condition held before budget/abort
    pub satisfied: bool,

    /// The node the wait observed (if it ever existed)
    pub node: Option<NodeHandle>,

    /// Number of condition evaluations performed
    pub polls: u32,

    /// Wall time spent in the wait
    pub elapsed_ms: u64,

    /// Terminal verdict
    pub verdict: WaitVerdict,

    /// For any-of waits: index of the condition that satisfied
    pub satisfied_index: Option<usize>,
}

impl WaitResult {
    pub fn satisfied(node: Option<NodeHandle>, polls: u32, elapsed_ms: u64) -> Self {
        Self {
            satisfied: true,
            node,
            polls,
            elapsed_ms,
            verdict: WaitVerdict::Satisfied,
            satisfied_index: None,
        }
    }

    pub fn timed_out(node: Option<NodeHandle>, polls: u32, elapsed_ms: u64) -> Self {
        Self {
            satisfied: false,
            node,
            polls,
            elapsed_ms,
            verdict: WaitVerdict::TimedOut,
            satisfied_index: None,
        }
    }

    pub fn aborted(node: Option<NodeHandle>, polls: u32, elapsed_ms: u64) -> Self {
        Self {
            satisfied: false,
            node,
            polls,
            elapsed_ms,
            verdict: WaitVerdict::Aborted,
            satisfied_index: None,
        }
    }

    pub fn with_satisfied_index(mut self, index: usize) -> Self {
        self.satisfied_index = Some(index);
        self
    }
}
