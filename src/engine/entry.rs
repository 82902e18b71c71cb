//! Recursive "enter state" helper used by `FlowEngine::start` (spec
//! §4.2.1 step 6). Unlike `StateMachine::execute_transition` (which only ever
//! resolves a single region and rejects a parallel target — `NestedParallel`,
//! spec §4.2.3), a flow's *initial* state may legitimately be a top-level
//! `Parallel` node, so this walks the full `Compound -> Parallel -> Atomic`
//! shape.
//!
//! Concurrent region entry mutates the shared `FlowContext` from independent
//! async tasks. Spec §5 documents this as unsynchronized/racy by design
//! (hooks should write to disjoint keys); Rust cannot compile genuinely
//! unsynchronized aliased mutation, so the honest translation is a mutex
//! that each region task briefly holds only for the duration of its own
//! hook call — this preserves true interleaving/concurrency without
//! introducing a correctness guarantee the spec does not promise.

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Mutex;

use crate::context::FlowContext;
use crate::definition::{FlowDefinition, StateNode};
use crate::errors::{EngineError, EngineResult};
use crate::instance::CurrentState;

pub async fn enter_initial(definition: &FlowDefinition, state_name: &str, context: &mut FlowContext) -> EngineResult<CurrentState> {
    let shared = Arc::new(Mutex::new(std::mem::take(context)));
    let result = enter_initial_locked(definition, state_name, &shared).await;
    *context = Arc::try_unwrap(shared).expect("no outstanding context borrows after join").into_inner();
    result
}

fn enter_initial_locked<'a>(definition: &'a FlowDefinition, state_name: &'a str, shared: &'a Arc<Mutex<FlowContext>>) -> std::pin::Pin<Box<dyn std::future::Future<Output = EngineResult<CurrentState>> + Send + 'a>> {
    Box::pin(async move {
        match definition.state(state_name) {
            Some(StateNode::Atomic(s)) => {
                if let Some(on_entry) = &s.on_entry {
                    let mut guard = shared.lock().await;
                    on_entry(&mut guard).await.map_err(|message| EngineError::HookError { state: state_name.to_string(), message })?;
                }
                Ok(CurrentState::Single(state_name.to_string()))
            }
            Some(StateNode::Compound(c)) => {
                if let Some(on_entry) = &c.on_entry {
                    let mut guard = shared.lock().await;
                    on_entry(&mut guard).await.map_err(|message| EngineError::HookError { state: state_name.to_string(), message })?;
                }
                enter_initial_locked(definition, &c.initial_sub_state, shared).await
            }
            Some(StateNode::Parallel(p)) => {
                if let Some(on_entry) = &p.on_entry {
                    let mut guard = shared.lock().await;
                    on_entry(&mut guard).await.map_err(|message| EngineError::HookError { state: state_name.to_string(), message })?;
                }

                let tasks = p.regions.iter().map(|region| enter_initial_locked(definition, &region.initial_state, shared));
                let results: Vec<EngineResult<CurrentState>> = join_all(tasks).await;

                let mut names = Vec::with_capacity(results.len());
                for r in results {
                    match r? {
                        CurrentState::Single(n) => names.push(n),
                        CurrentState::Parallel(_) => return Err(EngineError::NestedParallel { region: state_name.to_string() }),
                    }
                }
                Ok(CurrentState::Parallel(names))
            }
            None => Err(EngineError::Internal(format!("unknown state {state_name}"))),
        }
    })
}
