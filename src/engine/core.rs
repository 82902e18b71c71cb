//! The terminal, innermost step of the middleware chain (spec §4.2.2 steps
//! 1-6, §4.2.3, §4.3-on-failure). Deliberately re-fetches the instance from
//! the store rather than trusting `ctx.flow_state` — the snapshot captured
//! when `MiddlewareContext` was built is for middleware visibility only;
//! spec §4.4 calls out that the precondition check must see the latest
//! persisted state, which matters when middlewares themselves suspend before
//! calling `next()`.

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use log::info;
use tokio::sync::Mutex;

use crate::context::FlowContext;
use crate::definition::FlowDefinition;
use crate::engine::compensation::run_compensation;
use crate::engine::options::{ExecuteResult, TransitionRecord};
use crate::errors::{EngineError, EngineResult};
use crate::instance::{CurrentState, FlowStatus, HistoryRecord};
use crate::machine::{StateMachine, TransitionOutcome};
use crate::middleware::MiddlewareContext;
use crate::store::FlowStore;

pub async fn core_execute(store: &Arc<dyn FlowStore>, definition: &Arc<FlowDefinition>, ctx: &mut MiddlewareContext) -> EngineResult<ExecuteResult> {
    let flow_id = ctx.flow_id;
    let event = ctx.event.clone();

    let mut instance = store.get(flow_id).await?.ok_or(EngineError::NotFound { flow_id })?;
    if instance.status != FlowStatus::Active {
        return Err(EngineError::NotActive { flow_id, status: instance.status });
    }

    if let Some(key) = ctx.options.idempotency_key.clone() {
        if store.has_idempotency_key(&key).await? {
            info!("flow {flow_id} execute({event}) short-circuited: idempotency key {key} already bound");
            return Ok(ExecuteResult { success: true,
                                       transition: Some(TransitionRecord { from: instance.current_state.clone(), to: instance.current_state.clone(), event }),
                                       state: instance,
                                       compensated: false });
        }
        store.save_idempotency_key(&key, flow_id).await?;
    }

    if let Some(data) = &ctx.options.data {
        instance.context.merge(data);
    }

    let machine = StateMachine::new();
    let from_state = instance.current_state.clone();

    match dispatch(&machine, definition, &mut instance, &event, ctx.options.target_region).await {
        Ok(to_state) => {
            instance.history.push(HistoryRecord { from: from_state.clone(), to: to_state.clone(), event: event.clone(), timestamp: Utc::now() });
            instance.current_state = to_state.clone();
            if is_final_current(definition, &to_state) {
                instance.status = FlowStatus::Completed;
            }
            instance.touch();
            store.save(instance.clone()).await?;
            info!("flow {flow_id} {from_state} -> {to_state} on {event}");
            Ok(ExecuteResult { success: true, transition: Some(TransitionRecord { from: from_state, to: to_state, event }), state: instance, compensated: false })
        }
        Err(reason) => {
            let compensated = run_compensation(store.as_ref(), &mut instance, &reason).await?;
            store.save(instance.clone()).await?;
            Ok(ExecuteResult { success: false, transition: None, state: instance, compensated })
        }
    }
}

pub fn is_final_current(definition: &FlowDefinition, state: &CurrentState) -> bool {
    match state {
        CurrentState::Single(s) => definition.is_final(s),
        CurrentState::Parallel(v) => v.iter().all(|s| definition.is_final(s)),
    }
}

fn is_parallel_state(definition: &FlowDefinition, name: &str) -> bool {
    matches!(definition.state(name), Some(crate::definition::StateNode::Parallel(_)))
}

/// Single-step dispatch: non-parallel delegates straight to the state
/// machine; parallel honors `targetRegion` or broadcasts (spec §4.2.3).
/// Errors are returned as plain messages — the same shape
/// `TransitionOutcome::Failure` already uses — so the caller can feed them
/// uniformly into the compensation procedure.
async fn dispatch(machine: &StateMachine, definition: &FlowDefinition, instance: &mut crate::instance::FlowInstance, event: &str, target_region: Option<usize>) -> Result<CurrentState, String> {
    match instance.current_state.clone() {
        CurrentState::Single(state) => match machine.execute_transition(definition, &state, event, &mut instance.context).await {
            TransitionOutcome::Success { to, .. } => {
                if is_parallel_state(definition, &to) {
                    return Err(EngineError::NestedParallel { region: state }.to_string());
                }
                Ok(CurrentState::Single(to))
            }
            TransitionOutcome::Failure { error, .. } => Err(error),
        },
        CurrentState::Parallel(regions) => {
            if let Some(index) = target_region {
                if index >= regions.len() {
                    return Err(EngineError::InvalidRegion { index, region_count: regions.len() }.to_string());
                }
                let mut new_regions = regions.clone();
                match machine.execute_transition(definition, &regions[index], event, &mut instance.context).await {
                    TransitionOutcome::Success { to, .. } => {
                        if is_parallel_state(definition, &to) {
                            return Err(EngineError::NestedParallel { region: regions[index].clone() }.to_string());
                        }
                        new_regions[index] = to;
                        Ok(CurrentState::Parallel(new_regions))
                    }
                    TransitionOutcome::Failure { error, .. } => Err(error),
                }
            } else {
                broadcast(machine, definition, instance, event, &regions).await
            }
        }
    }
}

/// Broadcasts `event` to every region concurrently. Region hooks share
/// `instance.context`; spec §5 documents concurrent mutation of shared
/// context from region hooks as unsynchronized (hooks should write to
/// disjoint keys). Rust cannot compile genuinely unsynchronized aliased
/// mutation, so each region briefly holds a mutex only for the duration of
/// its own hook invocation — real interleaving, no data race, no ordering
/// guarantee beyond that.
async fn broadcast(machine: &StateMachine, definition: &FlowDefinition, instance: &mut crate::instance::FlowInstance, event: &str, regions: &[String]) -> Result<CurrentState, String> {
    let shared = Arc::new(Mutex::new(std::mem::take(&mut instance.context)));

    let tasks = regions.iter().map(|region| {
        let shared = shared.clone();
        async move {
            let mut guard = shared.lock().await;
            machine.execute_transition(definition, region, event, &mut guard).await
        }
    });
    let outcomes: Vec<TransitionOutcome> = join_all(tasks).await;
    instance.context = Arc::try_unwrap(shared).expect("no outstanding context borrows after join").into_inner();

    let mut new_regions = regions.to_vec();
    let mut accepted = 0usize;
    for (i, outcome) in outcomes.into_iter().enumerate() {
        if let TransitionOutcome::Success { to, .. } = outcome {
            if is_parallel_state(definition, &to) {
                return Err(EngineError::NestedParallel { region: regions[i].clone() }.to_string());
            }
            new_regions[i] = to;
            accepted += 1;
        }
    }

    if accepted == 0 {
        return Err(EngineError::NoRegionAccepted { event: event.to_string() }.to_string());
    }
    Ok(CurrentState::Parallel(new_regions))
}
