//! Rehearse CLI library
//!
//! Exposes the input loaders and reporting helpers for integration
//! testing; all replay logic lives in the workspace crates.

pub mod loader;
pub mod report;

pub use loader::{load_mappings, load_page, load_rows, load_steps};
pub use report::{print_summary, write_export};
