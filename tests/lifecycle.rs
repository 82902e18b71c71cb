//! `pause`/`resume`/`cancel`, `listFlows` filtering, and
//! `getPossibleTransitions` (spec §4.2 table).

use std::sync::Arc;

use flowcraft_core::{AtomicState, EngineError, ExecuteOptions, FlowDefinition, FlowEngine, FlowFilter, FlowStatus, InMemoryFlowStore, StartOptions, StateNode, Transition};

fn engine(def: FlowDefinition) -> FlowEngine {
    FlowEngine::new(Arc::new(InMemoryFlowStore::new()), def)
}

fn two_event_def() -> FlowDefinition {
    FlowDefinition::builder("order", "1", "pending")
        .with_state(StateNode::Atomic(AtomicState { transitions: vec![Transition::new("APPROVE", "approved"), Transition::new("REJECT", "rejected")], ..AtomicState::new("pending") }))
        .with_state(StateNode::Atomic(AtomicState::final_state("approved")))
        .with_state(StateNode::Atomic(AtomicState::final_state("rejected")))
        .build()
        .unwrap()
}

/// `pause` requires `active`; `execute` on a paused flow fails with
/// `NotActive`; `resume` requires `paused` and restores `active`.
#[tokio::test]
async fn pause_blocks_execute_and_resume_restores_it() {
    let engine = engine(two_event_def());
    let started = engine.start(StartOptions::new()).await.unwrap();

    let paused = engine.pause(started.flow_id).await.unwrap();
    assert_eq!(paused.status, FlowStatus::Paused);

    let blocked = engine.execute(started.flow_id, ExecuteOptions::new("APPROVE")).await;
    assert!(matches!(blocked, Err(EngineError::NotActive { .. })));

    // pause while already paused is rejected.
    assert!(matches!(engine.pause(started.flow_id).await, Err(EngineError::NotActive { .. })));

    let resumed = engine.resume(started.flow_id).await.unwrap();
    assert_eq!(resumed.status, FlowStatus::Active);

    let result = engine.execute(started.flow_id, ExecuteOptions::new("APPROVE")).await.unwrap();
    assert!(result.success);
    assert_eq!(result.state.status, FlowStatus::Completed);
}

/// `resume` on a non-paused flow fails with `NotActive`.
#[tokio::test]
async fn resume_requires_paused_status() {
    let engine = engine(two_event_def());
    let started = engine.start(StartOptions::new()).await.unwrap();
    assert!(matches!(engine.resume(started.flow_id).await, Err(EngineError::NotActive { .. })));
}

/// `cancel(triggerCompensation=false)` forces `failed` with the standard
/// cancellation message and never touches the compensation stack.
#[tokio::test]
async fn cancel_without_compensation_forces_failed() {
    let flow_engine = engine(two_event_def());
    let started = flow_engine.start(StartOptions::new()).await.unwrap();

    let cancelled = flow_engine.cancel(started.flow_id, false).await.unwrap();
    assert_eq!(cancelled.status, FlowStatus::Failed);
    assert_eq!(cancelled.error.unwrap().message, "Flow cancelled by user");

    // cancelling a completed flow is rejected.
    let other_engine = engine(two_event_def());
    let started2 = other_engine.start(StartOptions::new()).await.unwrap();
    other_engine.execute(started2.flow_id, ExecuteOptions::new("APPROVE")).await.unwrap();
    assert!(matches!(other_engine.cancel(started2.flow_id, false).await, Err(EngineError::NotActive { .. })));
}

/// `cancel(triggerCompensation=true)` runs the compensation procedure with
/// the cancellation message as the failure reason.
#[tokio::test]
async fn cancel_with_compensation_runs_the_saga_unwind() {
    use flowcraft_core::{ActionFn, FlowContext};
    use std::sync::atomic::{AtomicBool, Ordering};

    let ran = Arc::new(AtomicBool::new(false));
    let undo: ActionFn = {
        let ran = ran.clone();
        Arc::new(move |_ctx: &mut FlowContext| {
            let ran = ran.clone();
            Box::pin(async move {
                ran.store(true, Ordering::SeqCst);
                Ok(())
            })
        })
    };

    let engine = engine(two_event_def());
    let started = engine.start(StartOptions::new()).await.unwrap();
    engine.record_compensation(started.flow_id, undo, Some("undo-everything".into())).await.unwrap();

    let cancelled = engine.cancel(started.flow_id, true).await.unwrap();
    assert_eq!(cancelled.status, FlowStatus::Failed);
    assert!(cancelled.error.unwrap().message.ends_with(" (compensated)"));
    assert!(ran.load(Ordering::SeqCst));
}

/// `listFlows(filter)` conjoins every specified field.
#[tokio::test]
async fn list_flows_filters_by_status_and_definition() {
    let engine = engine(two_event_def());
    let a = engine.start(StartOptions::new()).await.unwrap();
    let b = engine.start(StartOptions::new()).await.unwrap();
    engine.execute(a.flow_id, ExecuteOptions::new("APPROVE")).await.unwrap();

    let active_only = engine.list_flows(Some(FlowFilter { status: Some(FlowStatus::Active), ..Default::default() })).await.unwrap();
    assert_eq!(active_only.len(), 1);
    assert_eq!(active_only[0].flow_id, b.flow_id);

    let completed_only = engine.list_flows(Some(FlowFilter { status: Some(FlowStatus::Completed), ..Default::default() })).await.unwrap();
    assert_eq!(completed_only.len(), 1);
    assert_eq!(completed_only[0].flow_id, a.flow_id);

    let all = engine.list_flows(None).await.unwrap();
    assert_eq!(all.len(), 2);
}

/// `getPossibleTransitions` returns the deduplicated union of event names
/// available from the current state, in first-seen order.
#[tokio::test]
async fn get_possible_transitions_deduplicates_event_names() {
    let def = FlowDefinition::builder("order", "1", "pending")
        .with_state(StateNode::Atomic(AtomicState { transitions: vec![Transition::new("APPROVE", "approved"), Transition::new("APPROVE", "approved-fast-track"), Transition::new("REJECT", "rejected")],
                                                      ..AtomicState::new("pending") }))
        .with_state(StateNode::Atomic(AtomicState::final_state("approved")))
        .with_state(StateNode::Atomic(AtomicState::final_state("approved-fast-track")))
        .with_state(StateNode::Atomic(AtomicState::final_state("rejected")))
        .build()
        .unwrap();
    let engine = engine(def);
    let started = engine.start(StartOptions::new()).await.unwrap();

    let events = engine.get_possible_transitions(started.flow_id).await.unwrap();
    assert_eq!(events, vec!["APPROVE".to_string(), "REJECT".to_string()]);
}
