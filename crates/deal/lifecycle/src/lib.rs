//! Deal Lifecycle Engine - the only component permitted to advance a
//! deal's current stage.
//!
//! Transitions are edges in a fixed directed graph. Each edge carries the
//! roles that must approve it, the document types that must exist, and an
//! ordered list of named blocker checks evaluated against a fresh
//! snapshot of deal facts. A transition re-validates everything at commit
//! time and then, in one atomic operation, appends a `StateTransition`
//! event and updates the deal's state record, so the two never diverge.
//!
//! `ON_HOLD` and `DEAD` sit outside the forward edge set: they are
//! explicit business overrides reachable from any non-terminal stage, and
//! resuming from hold restores the stage the deal was parked from.

#![deny(unsafe_code)]

mod approvals;
mod checks;
mod engine;
mod rules;

pub use approvals::*;
pub use checks::*;
pub use engine::*;
pub use rules::*;
