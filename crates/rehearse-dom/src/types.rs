//! Node handle and snapshot types shared across the collaborator boundary

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque reference to a live node held by the document collaborator.
///
/// Handles stay valid for as long as the node is attached; a detached
/// node answers `None` from [`crate::DocumentView::snapshot`].
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct NodeHandle(pub String);

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Axis-aligned bounding box of a node, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn is_zero_sized(&self) -> bool {
        self.width <= 0.0 && self.height <= 0.0
    }
}

/// Subset of computed style the replay core cares about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedStyle {
    pub opacity: f64,
    pub visibility: String,
    pub display: String,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            visibility: "visible".to_string(),
            display: "block".to_string(),
        }
    }
}

impl ComputedStyle {
    /// Whether the node is currently painted.
    ///
    /// Zero opacity, `visibility:hidden` and `display:none` all count as
    /// hidden; some interaction frameworks refuse events on such nodes.
    pub fn is_painted(&self) -> bool {
        self.opacity > 0.0 && self.visibility != "hidden" && self.display != "none"
    }
}

/// Point-in-time observation of a node.
///
/// Wait conditions are pure predicates over one of these; the evaluator
/// re-fetches a fresh snapshot on every poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Handle this snapshot was taken from
    pub handle: NodeHandle,

    /// Tag name (lowercase)
    pub tag: String,

    /// Visible text content
    pub text: String,

    /// Current value (inputs/textareas), if any
    pub value: Option<String>,

    /// Attribute map as observed
    pub attributes: HashMap<String, String>,

    /// Whether the element accepts interaction (`disabled` absent)
    pub enabled: bool,

    /// Whether the element sits inside a `<form>`
    pub in_form: bool,

    /// Bounding box, absent when the node has no layout
    pub bounding_box: Option<BoundingBox>,

    /// Computed style subset
    pub style: ComputedStyle,
}

impl NodeSnapshot {
    /// Visibility as the replay core defines it: painted and laid out.
    pub fn is_visible(&self) -> bool {
        self.style.is_painted()
            && self
                .bounding_box
                .map_or(false, |b| !b.is_zero_sized())
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> NodeSnapshot {
        NodeSnapshot {
            handle: NodeHandle("n1".to_string()),
            tag: "button".to_string(),
            text: "Submit".to_string(),
            value: None,
            attributes: HashMap::new(),
            enabled: true,
            in_form: false,
            bounding_box: Some(BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 120.0,
                height: 32.0,
            }),
            style: ComputedStyle::default(),
        }
    }

    #[test]
    fn painted_requires_all_three_style_gates() {
        let mut style = ComputedStyle::default();
        assert!(style.is_painted());

        style.opacity = 0.0;
        assert!(!style.is_painted());

        style.opacity = 1.0;
        style.visibility = "hidden".to_string();
        assert!(!style.is_painted());

        style.visibility = "visible".to_string();
        style.display = "none".to_string();
        assert!(!style.is_painted());
    }

    #[test]
    fn zero_sized_box_is_not_visible() {
        let mut snap = snapshot();
        assert!(snap.is_visible());

        snap.bounding_box = Some(BoundingBox {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
        });
        assert!(!snap.is_visible());

        snap.bounding_box = None;
        assert!(!snap.is_visible());
    }
}
