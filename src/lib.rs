//! flowcraft-core: durable workflow execution engine core.
//!
//! Purpose:
//! - Run one or more long-lived flow instances against a hierarchical/
//!   parallel state-machine definition, advancing each in response to
//!   externally-delivered events and persisting every observable step
//!   through a pluggable `FlowStore`.
//! - Own exactly the hard parts: the state machine executor, the flow
//!   lifecycle manager, the compensation (saga) stack, sub-flow composition,
//!   the idempotency cache, and the middleware chain wrapping execution.
//!
//! Out of scope (external collaborators): the declarative-source parser that
//! produces a `FlowDefinition`, concrete durable storage backends beyond the
//! bundled in-memory reference, expression evaluation for textual guards/
//! actions, and any CLI/demo driver.
//!
//! Components:
//! - `definition`: immutable flow configuration (`FlowDefinition`,
//!   `StateNode`, `Transition`, `RetryPolicy`).
//! - `instance`: mutable runtime state (`FlowInstance`, `CurrentState`,
//!   history, compensations, sub-flow references).
//! - `context`: the shared mutable workspace guards/actions/hooks operate on.
//! - `hooks`: the deferred-computation callable types (guards, actions,
//!   validations) that the core treats as opaque.
//! - `machine`: `StateMachine`, the single-step transition executor.
//! - `engine`: `FlowEngine`, lifecycle orchestration, compensation, sub-flows.
//! - `middleware`: the onion-style chain wrapping every `execute` call.
//! - `store`: the `FlowStore` contract plus an in-memory reference impl.
//! - `errors`: the closed `EngineError` taxonomy.
//!
//! Re-exports: the symbols most callers need are re-exported at the crate
//! root.

pub mod context;
pub mod definition;
pub mod engine;
pub mod errors;
pub mod hooks;
pub mod instance;
pub mod machine;
pub mod middleware;
pub mod store;

pub use context::FlowContext;
pub use definition::{AtomicKind, AtomicState, Backoff, CompoundState, FlowDefinition, FlowDefinitionBuilder, ParallelState, Region, RetryPolicy, StateNode, Transition, Validation};
pub use engine::{ExecuteOptions, ExecuteResult, FlowEngine, FlowEngineBuilder, FlowFilter, StartOptions, TransitionRecord};
pub use errors::{EngineError, EngineResult};
pub use hooks::{sync_action, sync_guard, sync_validation, ActionFn, CompensationAction, GuardFn, PredicateOutcome, ValidationFn};
pub use instance::{CompensationEntry, CurrentState, FlowError, FlowInstance, FlowStatus, HistoryRecord, SubFlowReference, SubFlowStatus};
pub use machine::{StateMachine, TransitionOutcome};
pub use middleware::{Middleware, MiddlewareChain, MiddlewareContext, Next};
pub use store::{FlowStore, InMemoryFlowStore};
