//! Wait conditions and their evaluation
//!
//! Conditions are pure predicates over a node snapshot; they carry no
//! mutable state. Stability is the one exception in spirit: it reads
//! the bounding-box history the poll loop accumulates, but the condition
//! value itself stays immutable.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use rehearse_dom::{BoundingBox, NodeSnapshot};

/// Caller-supplied predicate over a node snapshot.
#[derive(Clone)]
pub struct Predicate(Arc<dyn Fn(&NodeSnapshot) -> bool + Send + Sync>);

impl Predicate {
    pub fn new(f: impl Fn(&NodeSnapshot) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn test(&self, snapshot: &NodeSnapshot) -> bool {
        (self.0)(snapshot)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

/// State condition a wait can poll for.
#[derive(Debug, Clone)]
pub enum WaitCondition {
    /// Node is painted and has layout
    Visible,

    /// Node is absent or not painted
    Hidden,

    /// Node is present and accepts interaction
    Enabled,

    /// Node is present and disabled
    Disabled,

    /// Node text matches a pattern (regex, else substring)
    HasText(String),

    /// Node value matches a pattern (regex, else substring)
    HasValue(String),

    /// Attribute exists, optionally with an exact expected value
    HasAttribute {
        name: String,
        expected: Option<String>,
    },

    /// No bounding-box change across `samples` consecutive polls spaced
    /// `threshold_ms` apart
    Stable { threshold_ms: u64, samples: u32 },

    /// Caller-supplied predicate
    Custom(Predicate),

    /// Negation
    Not(Box<WaitCondition>),

    /// Every sub-condition holds (empty list holds trivially)
    AllOf(Vec<WaitCondition>),

    /// At least one sub-condition holds
    AnyOf(Vec<WaitCondition>),
}

impl WaitCondition {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            WaitCondition::Visible => "visible",
            WaitCondition::Hidden => "hidden",
            WaitCondition::Enabled => "enabled",
            WaitCondition::Disabled => "disabled",
            WaitCondition::HasText(_) => "has-text",
            WaitCondition::HasValue(_) => "has-value",
            WaitCondition::HasAttribute { .. } => "has-attribute",
            WaitCondition::Stable { .. } => "stable",
            WaitCondition::Custom(_) => "custom",
            WaitCondition::Not(_) => "not",
            WaitCondition::AllOf(_) => "all-of",
            WaitCondition::AnyOf(_) => "any-of",
        }
    }

    /// Innermost stability spacing, if the condition tree contains a
    /// `Stable`. The poll loop uses it as the sample spacing.
    pub fn stable_threshold_ms(&self) -> Option<u64> {
        match self {
            WaitCondition::Stable { threshold_ms, .. } => Some(*threshold_ms),
            WaitCondition::Not(inner) => inner.stable_threshold_ms(),
            WaitCondition::AllOf(list) | WaitCondition::AnyOf(list) => {
                list.iter().find_map(|c| c.stable_threshold_ms())
            }
            _ => None,
        }
    }
}

/// Pattern match per the page-side matcher convention: compile as a
/// regex when possible, otherwise fall back to substring containment.
fn pattern_matches(pattern: &str, value: &str) -> bool {
    match Regex::new(pattern) {
        Ok(regex) => regex.is_match(value),
        Err(_) => value.contains(pattern),
    }
}

/// Evaluate one condition against the current observation.
///
/// `snapshot` is `None` when the node is missing/detached; `box_history`
/// is the bounding box recorded at each poll so far, newest last.
pub fn evaluate(
    condition: &WaitCondition,
    snapshot: Option<&NodeSnapshot>,
    box_history: &[Option<BoundingBox>],
) -> bool {
    match condition {
        WaitCondition::Visible => snapshot.map_or(false, NodeSnapshot::is_visible),
        WaitCondition::Hidden => !snapshot.map_or(false, NodeSnapshot::is_visible),
        WaitCondition::Enabled => snapshot.map_or(false, |s| s.enabled),
        WaitCondition::Disabled => snapshot.map_or(false, |s| !s.enabled),
        WaitCondition::HasText(pattern) => {
            snapshot.map_or(false, |s| pattern_matches(pattern, &s.text))
        }
        WaitCondition::HasValue(pattern) => snapshot.map_or(false, |s| {
            pattern_matches(pattern, s.value.as_deref().unwrap_or(""))
        }),
        WaitCondition::HasAttribute { name, expected } => snapshot.map_or(false, |s| {
            match (s.attribute(name), expected) {
                (Some(actual), Some(expected)) => actual == expected,
                (Some(_), None) => true,
                (None, _) => false,
            }
        }),
        WaitCondition::Stable { samples, .. } => is_stable(box_history, *samples),
        WaitCondition::Custom(predicate) => snapshot.map_or(false, |s| predicate.test(s)),
        WaitCondition::Not(inner) => !evaluate(inner, snapshot, box_history),
        WaitCondition::AllOf(list) => list.iter().all(|c| evaluate(c, snapshot, box_history)),
        WaitCondition::AnyOf(list) => list.iter().any(|c| evaluate(c, snapshot, box_history)),
    }
}

/// `samples` consecutive observations, all laid out and unchanged.
fn is_stable(box_history: &[Option<BoundingBox>], samples: u32) -> bool {
    let samples = samples.max(1) as usize;
    if box_history.len() < samples {
        return false;
    }
    let window = &box_history[box_history.len() - samples..];
    let first = match window[0] {
        Some(b) => b,
        None => return false,
    };
    window.iter().all(|b| *b == Some(first))
}
