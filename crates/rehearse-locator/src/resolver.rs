//! Element resolver with fallback chain orchestration

use async_trait::async_trait;
use rehearse_core_types::LocatorBundle;
use rehearse_dom::DocumentView;
use tracing::{debug, warn};

use crate::errors::LocatorError;
use crate::strategies::{default_strategies, Strategy};
use crate::types::Resolution;

/// Element resolver trait.
#[async_trait]
pub trait ElementResolver: Send + Sync {
    /// Resolve a recorded bundle against a live document.
    ///
    /// `Ok(None)` means every strategy ran (or was skipped) without a
    /// match; it is a non-error outcome. Only a document-level failure in
    /// the final strategy surfaces as `Err`.
    async fn resolve(
        &self,
        bundle: &LocatorBundle,
        path: &str,
        document: &dyn DocumentView,
    ) -> Result<Option<Resolution>, LocatorError>;
}

/// Default resolver walking the strategy chain in priority order and
/// short-circuiting on the first match.
pub struct FallbackResolver {
    strategies: Vec<Box<dyn Strategy>>,
}

impl FallbackResolver {
    /// Create a resolver with the full default strategy chain.
    pub fn new() -> Self {
        Self {
            strategies: default_strategies(),
        }
    }

    /// Create a resolver with a custom strategy chain (tests, subsets).
    pub fn with_strategies(strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self { strategies }
    }
}

impl Default for FallbackResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ElementResolver for FallbackResolver {
    async fn resolve(
        &self,
        bundle: &LocatorBundle,
        path: &str,
        document: &dyn DocumentView,
    ) -> Result<Option<Resolution>, LocatorError> {
        let mut last_error: Option<LocatorError> = None;

        for (index, strategy) in self.strategies.iter().enumerate() {
            match strategy.resolve(bundle, path, document).await {
                Ok(Some(handle)) => {
                    debug!(
                        strategy = strategy.name(),
                        node = %handle,
                        "element resolved"
                    );
                    return Ok(Some(Resolution::new(handle, strategy.kind())));
                }
                Ok(None) => {
                    debug!(strategy = strategy.name(), "strategy produced no match");
                }
                Err(e) => {
                    // Non-fatal unless this was the last strategy standing.
                    warn!(strategy = strategy.name(), error = %e, "strategy failed");
                    if index == self.strategies.len() - 1 {
                        return Err(e);
                    }
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error {
            debug!(error = %e, "no strategy matched; earlier failures were swallowed");
        }
        Ok(None)
    }
}
