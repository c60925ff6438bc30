//! In-memory document and transport
//!
//! Backs tests and offline dry-runs of recordings against a page
//! snapshot. Real deployments wire their own [`DocumentView`] /
//! [`Transport`] adapters; nothing in the replay core knows the
//! difference.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::DocumentView;
use crate::errors::{DomError, TransportError};
use crate::transport::{ActionDescriptor, ActionOutcome, Transport};
use crate::types::{BoundingBox, ComputedStyle, NodeHandle, NodeSnapshot};

fn default_true() -> bool {
    true
}

fn default_bounding_box() -> Option<BoundingBox> {
    Some(BoundingBox {
        x: 0.0,
        y: 0.0,
        width: 100.0,
        height: 24.0,
    })
}

/// Declarative node description, also the page-fixture wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Unique handle key within the document
    pub key: String,

    /// Tag name (lowercase)
    pub tag: String,

    #[serde(default)]
    pub attributes: HashMap<String, String>,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub value: Option<String>,

    /// Structural path this node answers to
    #[serde(default)]
    pub path: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub in_form: bool,

    #[serde(default = "default_bounding_box")]
    pub bounding_box: Option<BoundingBox>,

    #[serde(default)]
    pub style: ComputedStyle,
}

impl NodeSpec {
    pub fn new(key: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            tag: tag.into(),
            attributes: HashMap::new(),
            text: String::new(),
            value: None,
            path: None,
            enabled: true,
            in_form: false,
            bounding_box: default_bounding_box(),
            style: ComputedStyle::default(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn in_form(mut self) -> Self {
        self.in_form = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.style.display = "none".to_string();
        self
    }
}

struct MemoryNode {
    spec: NodeSpec,
    saved_style: Option<ComputedStyle>,
}

#[derive(Default)]
struct DocumentState {
    // Insertion order is document order.
    order: Vec<String>,
    nodes: HashMap<String, MemoryNode>,
}

/// In-memory [`DocumentView`] implementation.
#[derive(Default)]
pub struct MemoryDocument {
    state: RwLock<DocumentState>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from a list of node specs (page fixture).
    pub fn from_specs(specs: Vec<NodeSpec>) -> Self {
        let doc = Self::new();
        for spec in specs {
            doc.insert(spec);
        }
        doc
    }

    pub fn insert(&self, spec: NodeSpec) -> NodeHandle {
        let mut state = self.state.write();
        let key = spec.key.clone();
        if !state.nodes.contains_key(&key) {
            state.order.push(key.clone());
        }
        state.nodes.insert(
            key.clone(),
            MemoryNode {
                spec,
                saved_style: None,
            },
        );
        NodeHandle(key)
    }

    pub fn remove(&self, key: &str) {
        let mut state = self.state.write();
        state.order.retain(|k| k != key);
        state.nodes.remove(key);
    }

    pub fn set_text(&self, key: &str, text: impl Into<String>) {
        if let Some(node) = self.state.write().nodes.get_mut(key) {
            node.spec.text = text.into();
        }
    }

    pub fn set_value(&self, key: &str, value: impl Into<String>) {
        if let Some(node) = self.state.write().nodes.get_mut(key) {
            node.spec.value = Some(value.into());
        }
    }

    pub fn set_enabled(&self, key: &str, enabled: bool) {
        if let Some(node) = self.state.write().nodes.get_mut(key) {
            node.spec.enabled = enabled;
        }
    }

    pub fn set_style(&self, key: &str, style: ComputedStyle) {
        if let Some(node) = self.state.write().nodes.get_mut(key) {
            node.spec.style = style;
        }
    }

    pub fn set_bounding_box(&self, key: &str, bounding_box: Option<BoundingBox>) {
        if let Some(node) = self.state.write().nodes.get_mut(key) {
            node.spec.bounding_box = bounding_box;
        }
    }

    fn snapshot_of(&self, key: &str) -> Option<NodeSnapshot> {
        let state = self.state.read();
        state.nodes.get(key).map(|node| NodeSnapshot {
            handle: NodeHandle(key.to_string()),
            tag: node.spec.tag.clone(),
            text: node.spec.text.clone(),
            value: node.spec.value.clone(),
            attributes: node.spec.attributes.clone(),
            enabled: node.spec.enabled,
            in_form: node.spec.in_form,
            bounding_box: node.spec.bounding_box,
            style: node.spec.style.clone(),
        })
    }

    fn find_first<F>(&self, pred: F) -> Option<NodeHandle>
    where
        F: Fn(&NodeSpec) -> bool,
    {
        let state = self.state.read();
        state
            .order
            .iter()
            .find(|key| state.nodes.get(*key).map_or(false, |n| pred(&n.spec)))
            .map(|key| NodeHandle(key.clone()))
    }
}

#[async_trait]
impl DocumentView for MemoryDocument {
    async fn node_by_id(&self, id: &str) -> Result<Option<NodeHandle>, DomError> {
        Ok(self.find_first(|spec| spec.attributes.get("id").map(|v| v.as_str()) == Some(id)))
    }

    async fn node_by_attribute(
        &self,
        attribute: &str,
        value: &str,
    ) -> Result<Option<NodeHandle>, DomError> {
        Ok(self.find_first(|spec| {
            spec.attributes.get(attribute).map(|v| v.as_str()) == Some(value)
        }))
    }

    async fn node_by_path(&self, path: &str) -> Result<Option<NodeHandle>, DomError> {
        Ok(self.find_first(|spec| spec.path.as_deref() == Some(path)))
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<NodeHandle>, DomError> {
        let parsed = SimpleSelector::parse(selector)?;
        Ok(self.find_first(|spec| parsed.matches(spec)))
    }

    async fn nodes_by_tag(&self, tag: &str) -> Result<Vec<NodeHandle>, DomError> {
        let state = self.state.read();
        Ok(state
            .order
            .iter()
            .filter(|key| {
                state
                    .nodes
                    .get(*key)
                    .map_or(false, |n| tag == "*" || n.spec.tag.eq_ignore_ascii_case(tag))
            })
            .map(|key| NodeHandle(key.clone()))
            .collect())
    }

    async fn snapshot(&self, handle: &NodeHandle) -> Result<Option<NodeSnapshot>, DomError> {
        Ok(self.snapshot_of(&handle.0))
    }

    async fn scroll_into_view(&self, handle: &NodeHandle) -> Result<(), DomError> {
        let state = self.state.read();
        if state.nodes.contains_key(&handle.0) {
            Ok(())
        } else {
            Err(DomError::NodeDetached(handle.0.clone()))
        }
    }

    async fn set_value_bypass(&self, handle: &NodeHandle, value: &str) -> Result<(), DomError> {
        let mut state = self.state.write();
        match state.nodes.get_mut(&handle.0) {
            Some(node) => {
                node.spec.value = Some(value.to_string());
                Ok(())
            }
            None => Err(DomError::NodeDetached(handle.0.clone())),
        }
    }

    async fn force_visible(&self, handle: &NodeHandle) -> Result<bool, DomError> {
        let mut state = self.state.write();
        let node = state
            .nodes
            .get_mut(&handle.0)
            .ok_or_else(|| DomError::NodeDetached(handle.0.clone()))?;
        if node.spec.style.is_painted() {
            return Ok(false);
        }
        debug!(node = %handle.0, "forcing hidden node visible for interaction");
        node.saved_style = Some(node.spec.style.clone());
        node.spec.style = ComputedStyle::default();
        Ok(true)
    }

    async fn clear_visibility_override(&self, handle: &NodeHandle) -> Result<(), DomError> {
        let mut state = self.state.write();
        if let Some(node) = state.nodes.get_mut(&handle.0) {
            if let Some(saved) = node.saved_style.take() {
                node.spec.style = saved;
            }
        }
        Ok(())
    }
}

/// Minimal CSS selector subset understood by the in-memory document:
/// `tag`, `#id`, `.class`, `[attr=value]`, and tag-qualified forms.
/// Combinators, pseudo-classes and anything else are rejected as
/// invalid, which exercises the resolver's swallow-and-skip path.
struct SimpleSelector {
    tag: Option<String>,
    id: Option<String>,
    class: Option<String>,
    attribute: Option<(String, String)>,
}

impl SimpleSelector {
    fn parse(selector: &str) -> Result<Self, DomError> {
        let selector = selector.trim();
        if selector.is_empty()
            || selector
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '>' | '+' | '~' | ',' | ':'))
        {
            return Err(DomError::InvalidSelector(selector.to_string()));
        }

        let mut parsed = Self {
            tag: None,
            id: None,
            class: None,
            attribute: None,
        };

        let mut rest = selector;
        if let Some(open) = rest.find('[') {
            let close = rest
                .rfind(']')
                .filter(|c| *c == rest.len() - 1)
                .ok_or_else(|| DomError::InvalidSelector(selector.to_string()))?;
            let inner = &rest[open + 1..close];
            let (name, value) = inner
                .split_once('=')
                .ok_or_else(|| DomError::InvalidSelector(selector.to_string()))?;
            let value = value.trim_matches(|c| c == '"' || c == '\'');
            if name.is_empty() {
                return Err(DomError::InvalidSelector(selector.to_string()));
            }
            parsed.attribute = Some((name.to_string(), value.to_string()));
            rest = &rest[..open];
        }

        if let Some((head, id)) = rest.split_once('#') {
            if id.is_empty() || id.contains('.') {
                return Err(DomError::InvalidSelector(selector.to_string()));
            }
            parsed.id = Some(id.to_string());
            rest = head;
        } else if let Some((head, class)) = rest.split_once('.') {
            if class.is_empty() || class.contains('.') {
                return Err(DomError::InvalidSelector(selector.to_string()));
            }
            parsed.class = Some(class.to_string());
            rest = head;
        }

        if !rest.is_empty() {
            if !rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Err(DomError::InvalidSelector(selector.to_string()));
            }
            parsed.tag = Some(rest.to_ascii_lowercase());
        }

        if parsed.tag.is_none()
            && parsed.id.is_none()
            && parsed.class.is_none()
            && parsed.attribute.is_none()
        {
            return Err(DomError::InvalidSelector(selector.to_string()));
        }

        Ok(parsed)
    }

    fn matches(&self, spec: &NodeSpec) -> bool {
        if let Some(tag) = &self.tag {
            if !spec.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if spec.attributes.get("id") != Some(id) {
                return false;
            }
        }
        if let Some(class) = &self.class {
            let classes = spec.attributes.get("class").map(|c| c.as_str()).unwrap_or("");
            if !classes.split_whitespace().any(|c| c == class) {
                return false;
            }
        }
        if let Some((name, value)) = &self.attribute {
            if spec.attributes.get(name) != Some(value) {
                return false;
            }
        }
        true
    }
}

/// One dispatch observed by the in-memory transport.
#[derive(Debug, Clone)]
pub struct DispatchRecord {
    pub target: NodeHandle,
    pub action: ActionDescriptor,
}

/// In-memory [`Transport`] applying actions straight to a
/// [`MemoryDocument`] and recording every dispatch for assertions.
pub struct MemoryTransport {
    document: Arc<MemoryDocument>,
    available: RwLock<bool>,
    fail_next: RwLock<Option<String>>,
    latency: Duration,
    dispatched: RwLock<Vec<DispatchRecord>>,
}

impl MemoryTransport {
    pub fn new(document: Arc<MemoryDocument>) -> Self {
        Self {
            document,
            available: RwLock::new(true),
            fail_next: RwLock::new(None),
            latency: Duration::ZERO,
            dispatched: RwLock::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_available(&self, available: bool) {
        *self.available.write() = available;
    }

    /// Make the next dispatch report a failure with the given reason.
    pub fn fail_next(&self, reason: impl Into<String>) {
        *self.fail_next.write() = Some(reason.into());
    }

    pub fn dispatched(&self) -> Vec<DispatchRecord> {
        self.dispatched.read().clone()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(
        &self,
        target: &NodeHandle,
        action: &ActionDescriptor,
        _timeout: Duration,
    ) -> Result<ActionOutcome, TransportError> {
        if !self.is_available() {
            return Err(TransportError::Unavailable(
                "no channel to document context".to_string(),
            ));
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(reason) = self.fail_next.write().take() {
            return Ok(ActionOutcome::failed(serde_json::json!({
                "reason": reason
            })));
        }

        let snapshot = self
            .document
            .snapshot(target)
            .await
            .map_err(|e| TransportError::Failed(e.to_string()))?;
        if snapshot.is_none() {
            return Ok(ActionOutcome::failed(serde_json::json!({
                "reason": format!("target {} is detached", target)
            })));
        }

        if let ActionDescriptor::Input { value } = action {
            // The bypass setter already wrote the value; mirror what the
            // input/change notification sequence leaves behind.
            self.document.set_value(&target.0, value.clone());
        }

        self.dispatched.write().push(DispatchRecord {
            target: target.clone(),
            action: action.clone(),
        });
        Ok(ActionOutcome::ok())
    }

    fn is_available(&self) -> bool {
        *self.available.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_button() -> MemoryDocument {
        let doc = MemoryDocument::new();
        doc.insert(
            NodeSpec::new("n1", "button")
                .with_attr("id", "submit")
                .with_attr("class", "primary wide")
                .with_text("Submit"),
        );
        doc.insert(
            NodeSpec::new("n2", "input")
                .with_attr("name", "email")
                .with_path("form[0]/input[1]"),
        );
        doc
    }

    #[tokio::test]
    async fn lookup_by_id_and_attribute() {
        let doc = doc_with_button();
        let by_id = doc.node_by_id("submit").await.unwrap().unwrap();
        assert_eq!(by_id.0, "n1");

        let by_name = doc
            .node_by_attribute("name", "email")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_name.0, "n2");

        assert!(doc.node_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn structural_path_lookup() {
        let doc = doc_with_button();
        let node = doc.node_by_path("form[0]/input[1]").await.unwrap().unwrap();
        assert_eq!(node.0, "n2");
    }

    #[tokio::test]
    async fn selector_subset_matches() {
        let doc = doc_with_button();
        assert_eq!(doc.query_selector("#submit").await.unwrap().unwrap().0, "n1");
        assert_eq!(
            doc.query_selector("button.primary").await.unwrap().unwrap().0,
            "n1"
        );
        assert_eq!(
            doc.query_selector("input[name=email]")
                .await
                .unwrap()
                .unwrap()
                .0,
            "n2"
        );
        assert!(doc.query_selector(".missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_selectors_are_rejected() {
        let doc = doc_with_button();
        for bad in ["div > span", "", "a:hover", "[=x]", "[name"] {
            assert!(
                matches!(
                    doc.query_selector(bad).await,
                    Err(DomError::InvalidSelector(_))
                ),
                "selector {:?} should be invalid",
                bad
            );
        }
    }

    #[tokio::test]
    async fn force_visible_round_trip() {
        let doc = MemoryDocument::new();
        let handle = doc.insert(NodeSpec::new("h1", "div").hidden());

        let snap = doc.snapshot(&handle).await.unwrap().unwrap();
        assert!(!snap.style.is_painted());

        assert!(doc.force_visible(&handle).await.unwrap());
        let snap = doc.snapshot(&handle).await.unwrap().unwrap();
        assert!(snap.style.is_painted());

        doc.clear_visibility_override(&handle).await.unwrap();
        let snap = doc.snapshot(&handle).await.unwrap().unwrap();
        assert!(!snap.style.is_painted());

        // Already-visible nodes report no override applied.
        let visible = doc.insert(NodeSpec::new("h2", "div"));
        assert!(!doc.force_visible(&visible).await.unwrap());
    }

    #[tokio::test]
    async fn transport_records_and_applies_input() {
        let doc = Arc::new(doc_with_button());
        let transport = MemoryTransport::new(doc.clone());
        let target = NodeHandle("n2".to_string());

        doc.set_value_bypass(&target, "ada@example.com").await.unwrap();
        let outcome = transport
            .send(
                &target,
                &ActionDescriptor::Input {
                    value: "ada@example.com".to_string(),
                },
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert!(outcome.ok);

        let snap = doc.snapshot(&target).await.unwrap().unwrap();
        assert_eq!(snap.value.as_deref(), Some("ada@example.com"));
        assert_eq!(transport.dispatched().len(), 1);
    }

    #[tokio::test]
    async fn unavailable_transport_errors() {
        let doc = Arc::new(MemoryDocument::new());
        let transport = MemoryTransport::new(doc);
        transport.set_available(false);
        let err = transport
            .send(
                &NodeHandle("x".to_string()),
                &ActionDescriptor::Click,
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Unavailable(_)));
    }
}
