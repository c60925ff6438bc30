//! Collaborator boundary for the rehearse replay engine.
//!
//! The replay core never talks to a concrete renderer. It sees two traits:
//! - [`DocumentView`]: node lookup, snapshots, geometry, and the
//!   framework-bypass value setter;
//! - [`Transport`]: dispatch of a single action into the execution
//!   context that owns the document.
//!
//! An in-memory implementation of both ships here for tests and offline
//! dry-runs; real deployments wire in their own adapters.

pub mod document;
pub mod errors;
pub mod memory;
pub mod transport;
pub mod types;

pub use document::*;
pub use errors::*;
pub use memory::*;
pub use transport::*;
pub use types::*;
