//! Order conversation state machine
//!
//! State is threaded by value through pure-ish transition functions; the
//! only effects are classifier calls, which always resolve to a value.

pub mod state;
pub mod transition;
mod workflow;

#[cfg(test)]
mod proptests;

pub use state::{ConversationState, InputType, Route, SnapshotError, Step};
pub use workflow::{ResumeError, TurnOutcome, Workflow};
