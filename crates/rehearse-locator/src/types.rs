//! Core types for the locator system

use rehearse_dom::NodeHandle;
use serde::{Deserialize, Serialize};

/// Locator strategy enumeration, in fallback priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Exact `id` attribute match
    Id,

    /// Exact `name` attribute match
    Name,

    /// Structural-path re-derivation
    Path,

    /// Exact ARIA label match
    AriaLabel,

    /// Exact placeholder match
    Placeholder,

    /// First populated custom data-attribute, exact match
    DataAttribute,

    /// CSS-equivalent selector (invalid selectors skipped, not fatal)
    CssSelector,

    /// Case-insensitive free-text containment over tag candidates
    FuzzyText,
}

impl StrategyKind {
    /// Get strategy name as string.
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Id => "id",
            StrategyKind::Name => "name",
            StrategyKind::Path => "path",
            StrategyKind::AriaLabel => "aria-label",
            StrategyKind::Placeholder => "placeholder",
            StrategyKind::DataAttribute => "data-attribute",
            StrategyKind::CssSelector => "css-selector",
            StrategyKind::FuzzyText => "fuzzy-text",
        }
    }

    /// All strategies in fallback order. First match wins.
    pub fn fallback_chain() -> Vec<StrategyKind> {
        vec![
            StrategyKind::Id,
            StrategyKind::Name,
            StrategyKind::Path,
            StrategyKind::AriaLabel,
            StrategyKind::Placeholder,
            StrategyKind::DataAttribute,
            StrategyKind::CssSelector,
            StrategyKind::FuzzyText,
        ]
    }
}

/// Successful element resolution: the live node plus the strategy that
/// found it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Resolved node handle
    pub handle: NodeHandle,

    /// Strategy that matched
    pub strategy: StrategyKind,
}

impl Resolution {
    pub fn new(handle: NodeHandle, strategy: StrategyKind) -> Self {
        Self { handle, strategy }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_chain_order() {
        let chain = StrategyKind::fallback_chain();
        assert_eq!(chain.len(), 8);
        assert_eq!(chain[0], StrategyKind::Id);
        assert_eq!(chain[1], StrategyKind::Name);
        assert_eq!(chain[2], StrategyKind::Path);
        assert_eq!(chain.last(), Some(&StrategyKind::FuzzyText));
    }

    #[test]
    fn strategy_names() {
        assert_eq!(StrategyKind::Id.name(), "id");
        assert_eq!(StrategyKind::AriaLabel.name(), "aria-label");
        assert_eq!(StrategyKind::CssSelector.name(), "css-selector");
        assert_eq!(StrategyKind::FuzzyText.name(), "fuzzy-text");
    }
}
