//! Document collaborator trait

use async_trait::async_trait;

use crate::errors::DomError;
use crate::types::{NodeHandle, NodeSnapshot};

/// Read/observe surface of a live interactive document.
///
/// Lookup methods return `Ok(None)` when nothing matches; `Err` is
/// reserved for communication failures and malformed queries. The
/// replay core treats implementations as stateless and reentrant.
#[async_trait]
pub trait DocumentView: Send + Sync {
    /// Look up a node by its `id` attribute (exact match).
    async fn node_by_id(&self, id: &str) -> Result<Option<NodeHandle>, DomError>;

    /// Look up the first node carrying `attribute=value` (exact match),
    /// in document order.
    async fn node_by_attribute(
        &self,
        attribute: &str,
        value: &str,
    ) -> Result<Option<NodeHandle>, DomError>;

    /// Re-derive a recorded structural path to a live node.
    async fn node_by_path(&self, path: &str) -> Result<Option<NodeHandle>, DomError>;

    /// First match for a CSS selector, in document order.
    ///
    /// A syntactically invalid selector is `Err(DomError::InvalidSelector)`;
    /// callers decide whether that is fatal.
    async fn query_selector(&self, selector: &str) -> Result<Option<NodeHandle>, DomError>;

    /// All nodes of a tag, in document order. `"*"` matches every node.
    async fn nodes_by_tag(&self, tag: &str) -> Result<Vec<NodeHandle>, DomError>;

    /// Fresh observation of a node; `None` when the handle is detached.
    async fn snapshot(&self, handle: &NodeHandle) -> Result<Option<NodeSnapshot>, DomError>;

    /// Bring a node into the viewport before interacting with it.
    async fn scroll_into_view(&self, handle: &NodeHandle) -> Result<(), DomError>;

    /// Set an input's value through the native property setter, bypassing
    /// framework-level interception so framework-driven inputs observe
    /// the change.
    async fn set_value_bypass(&self, handle: &NodeHandle, value: &str) -> Result<(), DomError>;

    /// Temporarily force a computed-hidden node visible.
    ///
    /// Returns `true` when an override was applied (the node was hidden),
    /// `false` when the node was already painted.
    async fn force_visible(&self, handle: &NodeHandle) -> Result<bool, DomError>;

    /// Remove a visibility override applied by [`Self::force_visible`].
    async fn clear_visibility_override(&self, handle: &NodeHandle) -> Result<(), DomError>;
}
