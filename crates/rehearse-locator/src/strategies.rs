//! Element resolution strategies
//!
//! Eight strategies in fallback order:
//! 1. Id          - exact `id` attribute match
//! 2. Name        - exact `name` attribute match
//! 3. Path        - structural-path re-derivation
//! 4. AriaLabel   - exact ARIA label match
//! 5. Placeholder - exact placeholder match
//! 6. DataAttr    - first populated custom data-attribute
//! 7. CssSelector - recorded CSS-equivalent selector
//! 8. FuzzyText   - case-insensitive text containment scan

use async_trait::async_trait;
use rehearse_core_types::LocatorBundle;
use rehearse_dom::{DocumentView, DomError, NodeHandle};
use tracing::debug;

use crate::errors::LocatorError;
use crate::types::StrategyKind;

/// Minimum recorded text length for the fuzzy fallback to engage.
pub const FUZZY_TEXT_MIN_LEN: usize = 3;

/// Strategy trait for element resolution.
///
/// Strategies are pure over their inputs and hold no state; a strategy
/// that does not apply to the given bundle answers `Ok(None)`.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Attempt to resolve the element using this strategy.
    async fn resolve(
        &self,
        bundle: &LocatorBundle,
        path: &str,
        document: &dyn DocumentView,
    ) -> Result<Option<NodeHandle>, LocatorError>;

    /// Get strategy kind.
    fn kind(&self) -> StrategyKind;

    /// Get strategy name.
    fn name(&self) -> &'static str {
        self.kind().name()
    }
}

fn map_dom_error(kind: StrategyKind, err: DomError) -> LocatorError {
    LocatorError::StrategyFailed {
        strategy: kind.name().to_string(),
        reason: err.to_string(),
    }
}

fn populated(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Exact `id` attribute match.
pub struct IdStrategy;

#[async_trait]
impl Strategy for IdStrategy {
    async fn resolve(
        &self,
        bundle: &LocatorBundle,
        _path: &str,
        document: &dyn DocumentView,
    ) -> Result<Option<NodeHandle>, LocatorError> {
        match populated(&bundle.id) {
            Some(id) => document
                .node_by_id(id)
                .await
                .map_err(|e| map_dom_error(self.kind(), e)),
            None => Ok(None),
        }
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Id
    }
}

/// Exact `name` attribute match.
pub struct NameStrategy;

#[async_trait]
impl Strategy for NameStrategy {
    async fn resolve(
        &self,
        bundle: &LocatorBundle,
        _path: &str,
        document: &dyn DocumentView,
    ) -> Result<Option<NodeHandle>, LocatorError> {
        match populated(&bundle.name) {
            Some(name) => document
                .node_by_attribute("name", name)
                .await
                .map_err(|e| map_dom_error(self.kind(), e)),
            None => Ok(None),
        }
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Name
    }
}

/// Structural-path re-derivation of the recorded path.
///
/// The path handed to `resolve` (recorded on the step itself) wins over
/// the bundle's copy when both are present.
pub struct PathStrategy;

#[async_trait]
impl Strategy for PathStrategy {
    async fn resolve(
        &self,
        bundle: &LocatorBundle,
        path: &str,
        document: &dyn DocumentView,
    ) -> Result<Option<NodeHandle>, LocatorError> {
        let step_path = path.trim();
        let effective = if !step_path.is_empty() {
            Some(step_path)
        } else {
            populated(&bundle.path)
        };
        match effective {
            Some(p) => document
                .node_by_path(p)
                .await
                .map_err(|e| map_dom_error(self.kind(), e)),
            None => Ok(None),
        }
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Path
    }
}

/// Exact ARIA label match.
pub struct AriaLabelStrategy;

#[async_trait]
impl Strategy for AriaLabelStrategy {
    async fn resolve(
        &self,
        bundle: &LocatorBundle,
        _path: &str,
        document: &dyn DocumentView,
    ) -> Result<Option<NodeHandle>, LocatorError> {
        match populated(&bundle.aria_label) {
            Some(label) => document
                .node_by_attribute("aria-label", label)
                .await
                .map_err(|e| map_dom_error(self.kind(), e)),
            None => Ok(None),
        }
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::AriaLabel
    }
}

/// Exact placeholder match.
pub struct PlaceholderStrategy;

#[async_trait]
impl Strategy for PlaceholderStrategy {
    async fn resolve(
        &self,
        bundle: &LocatorBundle,
        _path: &str,
        document: &dyn DocumentView,
    ) -> Result<Option<NodeHandle>, LocatorError> {
        match populated(&bundle.placeholder) {
            Some(placeholder) => document
                .node_by_attribute("placeholder", placeholder)
                .await
                .map_err(|e| map_dom_error(self.kind(), e)),
            None => Ok(None),
        }
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Placeholder
    }
}

/// First populated custom data-attribute, exact match.
pub struct DataAttributeStrategy;

#[async_trait]
impl Strategy for DataAttributeStrategy {
    async fn resolve(
        &self,
        bundle: &LocatorBundle,
        _path: &str,
        document: &dyn DocumentView,
    ) -> Result<Option<NodeHandle>, LocatorError> {
        match bundle.first_data_attribute() {
            Some((name, value)) => document
                .node_by_attribute(name, value)
                .await
                .map_err(|e| map_dom_error(self.kind(), e)),
            None => Ok(None),
        }
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::DataAttribute
    }
}

/// Recorded CSS-equivalent selector.
///
/// A selector the document rejects as invalid is swallowed and skipped;
/// only I/O failures count as strategy errors.
pub struct CssSelectorStrategy;

#[async_trait]
impl Strategy for CssSelectorStrategy {
    async fn resolve(
        &self,
        bundle: &LocatorBundle,
        _path: &str,
        document: &dyn DocumentView,
    ) -> Result<Option<NodeHandle>, LocatorError> {
        let selector = match populated(&bundle.css_selector) {
            Some(s) => s,
            None => return Ok(None),
        };
        match document.query_selector(selector).await {
            Ok(found) => Ok(found),
            Err(DomError::InvalidSelector(s)) => {
                debug!(selector = %s, "skipping syntactically invalid recorded selector");
                Ok(None)
            }
            Err(e) => Err(map_dom_error(self.kind(), e)),
        }
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::CssSelector
    }
}

/// Fuzzy free-text containment.
///
/// Requires recorded text of at least [`FUZZY_TEXT_MIN_LEN`] characters,
/// scans candidates of the recorded tag (or `*`), matches by
/// case-insensitive substring, and returns the first hit in document
/// order.
pub struct FuzzyTextStrategy;

#[async_trait]
impl Strategy for FuzzyTextStrategy {
    async fn resolve(
        &self,
        bundle: &LocatorBundle,
        _path: &str,
        document: &dyn DocumentView,
    ) -> Result<Option<NodeHandle>, LocatorError> {
        let needle = match populated(&bundle.text) {
            Some(t) if t.len() >= FUZZY_TEXT_MIN_LEN => t.to_lowercase(),
            _ => return Ok(None),
        };
        let tag = populated(&bundle.tag).unwrap_or("*");

        let candidates = document
            .nodes_by_tag(tag)
            .await
            .map_err(|e| map_dom_error(self.kind(), e))?;

        for handle in candidates {
            let snapshot = document
                .snapshot(&handle)
                .await
                .map_err(|e| map_dom_error(self.kind(), e))?;
            if let Some(snapshot) = snapshot {
                if snapshot.text.to_lowercase().contains(&needle) {
                    return Ok(Some(handle));
                }
            }
        }
        Ok(None)
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::FuzzyText
    }
}

/// Build the full strategy chain in fallback order.
pub fn default_strategies() -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(IdStrategy),
        Box::new(NameStrategy),
        Box::new(PathStrategy),
        Box::new(AriaLabelStrategy),
        Box::new(PlaceholderStrategy),
        Box::new(DataAttributeStrategy),
        Box::new(CssSelectorStrategy),
        Box::new(FuzzyTextStrategy),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rehearse_dom::{MemoryDocument, NodeSpec};

    fn bundle() -> LocatorBundle {
        LocatorBundle::default()
    }

    #[tokio::test]
    async fn id_strategy_skips_without_id() {
        let doc = MemoryDocument::new();
        let found = IdStrategy.resolve(&bundle(), "", &doc).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn fuzzy_text_requires_min_length() {
        let doc = MemoryDocument::new();
        doc.insert(NodeSpec::new("n1", "button").with_text("OK"));

        let mut b = bundle();
        b.text = Some("OK".to_string());
        let found = FuzzyTextStrategy.resolve(&b, "", &doc).await.unwrap();
        assert!(found.is_none(), "two-character text must not fuzzy match");

        doc.insert(NodeSpec::new("n2", "button").with_text("Confirm order"));
        b.text = Some("confirm".to_string());
        let found = FuzzyTextStrategy.resolve(&b, "", &doc).await.unwrap();
        assert_eq!(found.unwrap().0, "n2");
    }

    #[tokio::test]
    async fn fuzzy_text_respects_recorded_tag() {
        let doc = MemoryDocument::new();
        doc.insert(NodeSpec::new("d1", "div").with_text("Checkout"));
        doc.insert(NodeSpec::new("b1", "button").with_text("Checkout"));

        let mut b = bundle();
        b.text = Some("checkout".to_string());
        b.tag = Some("button".to_string());
        let found = FuzzyTextStrategy.resolve(&b, "", &doc).await.unwrap();
        assert_eq!(found.unwrap().0, "b1");

        // No tag recorded: first hit in document order wins.
        b.tag = None;
        let found = FuzzyTextStrategy.resolve(&b, "", &doc).await.unwrap();
        assert_eq!(found.unwrap().0, "d1");
    }

    #[tokio::test]
    async fn invalid_selector_is_swallowed() {
        let doc = MemoryDocument::new();
        let mut b = bundle();
        b.css_selector = Some("div > span:hover".to_string());
        let found = CssSelectorStrategy.resolve(&b, "", &doc).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn path_prefers_step_path_over_bundle_path() {
        let doc = MemoryDocument::new();
        doc.insert(NodeSpec::new("a", "input").with_path("form/input[0]"));
        doc.insert(NodeSpec::new("b", "input").with_path("form/input[1]"));

        let mut b = bundle();
        b.path = Some("form/input[1]".to_string());
        let found = PathStrategy
            .resolve(&b, "form/input[0]", &doc)
            .await
            .unwrap();
        assert_eq!(found.unwrap().0, "a");

        let found = PathStrategy.resolve(&b, "", &doc).await.unwrap();
        assert_eq!(found.unwrap().0, "b");
    }
}
