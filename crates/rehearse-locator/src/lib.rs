//! Multi-strategy element resolution with ordered fallback
//!
//! Turns a recorded [`rehearse_core_types::LocatorBundle`] back into a
//! live node. Strategies run in a fixed priority order and the first
//! match wins; order *is* the tie-break policy, there is no cross-strategy
//! scoring. Individual strategy failures are non-fatal.

pub mod errors;
pub mod resolver;
pub mod strategies;
pub mod types;

pub use errors::*;
pub use resolver::*;
pub use strategies::*;
pub use types::*;
