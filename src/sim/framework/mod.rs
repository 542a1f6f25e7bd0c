//! Run driver: per-thread contexts, user callbacks and the run manager.
//!
//! The master builds the geometry once; each rayon worker gets its own
//! [`RunContext`] sharing that geometry and owning everything it mutates.

pub mod context;
pub mod module;
pub mod run_manager;

pub use context::RunContext;
pub use module::SimulationCallbacks;
pub use run_manager::{RunManager, RunOutcome, split_events};
