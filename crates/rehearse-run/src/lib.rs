//! Run orchestration for the rehearse replay engine
//!
//! Iterates the cross product of steps × data rows, owning the run-level
//! state machine (idle → preparing → running ⇄ paused → stopping →
//! completed/failed/stopped), pause/resume/stop/reset control, progress
//! accounting, and the structured result export. All counter mutation
//! happens inside the orchestration loop; callers only ever see cloned
//! snapshots.

pub mod errors;
pub mod orchestrator;
pub mod state;
pub mod types;

pub use errors::*;
pub use orchestrator::*;
pub use state::*;
pub use types::*;
