//! Immutable flow configuration (spec §3.1): `FlowDefinition`, `StateNode`
//! and its variants, transitions and retry policy.

pub mod flow_definition;
pub mod state_node;
pub mod transition;

pub use flow_definition::{FlowDefinition, FlowDefinitionBuilder, GlobalTransitions};
pub use state_node::{AtomicKind, AtomicState, CompoundState, ParallelState, Region, StateNode};
pub use transition::{Backoff, RetryPolicy, Transition, Validation};
