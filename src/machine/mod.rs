//! Single-step transition executor (spec §4.1).

pub mod state_machine;

pub use state_machine::{StateMachine, TransitionOutcome};
