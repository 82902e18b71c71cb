//! `FlowEngine` — lifecycle and orchestration (spec §4.2). Owns a store, a
//! validated `FlowDefinition`, the stateless transition executor, and a
//! rebuildable middleware chain, mirroring the shape of
//! `chem-core::engine::Engine` (store + pipeline + hooks) adapted to a
//! single flow definition per engine instance.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{info, warn};
use uuid::Uuid;

use crate::definition::FlowDefinition;
use crate::engine::builder::FlowEngineBuilder;
use crate::engine::compensation::run_compensation;
use crate::engine::core::{core_execute, is_final_current};
use crate::engine::options::{ExecuteOptions, ExecuteResult, FlowFilter, StartOptions};
use crate::errors::{EngineError, EngineResult};
use crate::hooks::CompensationAction;
use crate::instance::{CompensationEntry, CurrentState, FlowError, FlowInstance, FlowStatus, SubFlowReference, SubFlowStatus};
use crate::middleware::{CoreStep, Middleware, MiddlewareChain, MiddlewareContext};
use crate::store::FlowStore;

pub struct FlowEngine {
    store: Arc<dyn FlowStore>,
    definition: Arc<FlowDefinition>,
    middleware: MiddlewareChain,
}

impl FlowEngine {
    pub fn new(store: Arc<dyn FlowStore>, definition: FlowDefinition) -> Self {
        Self::new_with_middleware(store, definition, MiddlewareChain::new())
    }

    pub fn new_with_middleware(store: Arc<dyn FlowStore>, definition: FlowDefinition, middleware: MiddlewareChain) -> Self {
        Self { store, definition: Arc::new(definition), middleware }
    }

    pub fn builder(store: Arc<dyn FlowStore>) -> FlowEngineBuilder {
        FlowEngineBuilder::new(store)
    }

    pub fn definition(&self) -> &FlowDefinition {
        &self.definition
    }

    /// `use(middleware)` — appends a middleware; returns `&mut Self` for
    /// chaining (spec §4.2 table). Outer-to-inner nesting follows
    /// registration order.
    pub fn use_middleware(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.middleware.use_middleware(middleware);
        self
    }

    /// `clearMiddleware()` — empties the chain (spec §4.4).
    pub fn clear_middleware(&mut self) {
        self.middleware.clear();
    }

    /// `start(opts)` — spec §4.2.1.
    pub async fn start(&self, opts: StartOptions) -> EngineResult<FlowInstance> {
        if let Some(key) = &opts.idempotency_key {
            if let Some(existing_id) = self.store.get_flow_id_by_idempotency_key(key).await? {
                return self.store.get(existing_id).await?.ok_or(EngineError::NotFound { flow_id: existing_id });
            }
        }

        let flow_id = opts.flow_id.unwrap_or_else(Uuid::new_v4);
        if self.store.exists(flow_id).await? {
            return Err(EngineError::Duplicate { flow_id });
        }
        if let Some(key) = &opts.idempotency_key {
            self.store.save_idempotency_key(key, flow_id).await?;
        }

        let mut context = opts.context.unwrap_or_default();
        let resolution = crate::engine::entry::enter_initial(&self.definition, &self.definition.initial_state, &mut context).await;

        let nominal_state = CurrentState::Single(self.definition.initial_state.clone());
        let mut instance = FlowInstance::new(flow_id, &self.definition.id, &self.definition.version, nominal_state.clone(), context, opts.parent_flow_id);

        match resolution {
            Ok(resolved) => {
                let completed = is_final_current(&self.definition, &resolved);
                instance.current_state = resolved;
                if completed {
                    instance.status = FlowStatus::Completed;
                }
                info!("flow {flow_id} started in state {}", instance.current_state);
            }
            Err(e) => {
                instance.status = FlowStatus::Failed;
                instance.error = Some(FlowError { message: e.to_string(), state: nominal_state, timestamp: Utc::now() });
                warn!("flow {flow_id} failed entering its initial state: {e}");
            }
        }

        instance.touch();
        self.store.save(instance.clone()).await?;
        Ok(instance)
    }

    /// `execute(flowId, opts)` — spec §4.2.2. Wraps `core_execute` in the
    /// middleware chain; see `engine::core` for why the core step re-fetches
    /// the instance instead of trusting the snapshot handed to middlewares.
    pub async fn execute(&self, flow_id: Uuid, opts: ExecuteOptions) -> EngineResult<ExecuteResult> {
        let snapshot = self.store.get(flow_id).await?.ok_or(EngineError::NotFound { flow_id })?;
        let event = opts.event.clone();

        let mut ctx = MiddlewareContext { flow_id, event, flow_state: snapshot, options: opts, start_time: Utc::now() };

        let store = self.store.clone();
        let definition = self.definition.clone();
        let core: Box<CoreStep> = Box::new(move |mctx: &mut MiddlewareContext| {
            let store = store.clone();
            let definition = definition.clone();
            Box::pin(async move { core_execute(&store, &definition, mctx).await })
        });

        match self.middleware.dispatch(&mut ctx, core.as_ref()).await {
            Ok(result) => Ok(result),
            Err(e) if e.is_execution_error() => {
                // A middleware raised an execution-classified error directly
                // (without calling `next()`), so `core_execute` never ran the
                // compensation procedure for it. Run it here against the
                // latest persisted state, same as `core_execute` would.
                let mut instance = self.store.get(flow_id).await?.ok_or(EngineError::NotFound { flow_id })?;
                let compensated = run_compensation(self.store.as_ref(), &mut instance, &e.to_string()).await?;
                self.store.save(instance.clone()).await?;
                warn!("flow {flow_id} execute failed in middleware: {e}");
                Ok(ExecuteResult { success: false, transition: None, state: instance, compensated })
            }
            Err(e) => Err(e),
        }
    }

    /// `pause(flowId)` — spec §4.2.4.
    pub async fn pause(&self, flow_id: Uuid) -> EngineResult<FlowInstance> {
        let mut instance = self.store.get(flow_id).await?.ok_or(EngineError::NotFound { flow_id })?;
        if instance.status != FlowStatus::Active {
            return Err(EngineError::NotActive { flow_id, status: instance.status });
        }
        instance.status = FlowStatus::Paused;
        instance.touch();
        self.store.save(instance.clone()).await?;
        info!("flow {flow_id} paused");
        Ok(instance)
    }

    /// `resume(flowId)` — spec §4.2.4.
    pub async fn resume(&self, flow_id: Uuid) -> EngineResult<FlowInstance> {
        let mut instance = self.store.get(flow_id).await?.ok_or(EngineError::NotFound { flow_id })?;
        if instance.status != FlowStatus::Paused {
            return Err(EngineError::NotActive { flow_id, status: instance.status });
        }
        instance.status = FlowStatus::Active;
        instance.touch();
        self.store.save(instance.clone()).await?;
        info!("flow {flow_id} resumed");
        Ok(instance)
    }

    /// `cancel(flowId, triggerCompensation?)` — spec §4.2.4.
    pub async fn cancel(&self, flow_id: Uuid, trigger_compensation: bool) -> EngineResult<FlowInstance> {
        let mut instance = self.store.get(flow_id).await?.ok_or(EngineError::NotFound { flow_id })?;
        if instance.status == FlowStatus::Completed {
            return Err(EngineError::NotActive { flow_id, status: instance.status });
        }

        if trigger_compensation {
            run_compensation(self.store.as_ref(), &mut instance, "Flow cancelled by user").await?;
        } else {
            instance.status = FlowStatus::Failed;
            instance.error = Some(FlowError { message: "Flow cancelled by user".to_string(), state: instance.current_state.clone(), timestamp: Utc::now() });
        }
        instance.touch();
        self.store.save(instance.clone()).await?;
        warn!("flow {flow_id} cancelled (compensation={trigger_compensation})");
        Ok(instance)
    }

    /// `getFlow(flowId)` — spec §4.2 table.
    pub async fn get_flow(&self, flow_id: Uuid) -> EngineResult<FlowInstance> {
        self.store.get(flow_id).await?.ok_or(EngineError::NotFound { flow_id })
    }

    /// `listFlows(filter?)` — spec §4.2 table.
    pub async fn list_flows(&self, filter: Option<FlowFilter>) -> EngineResult<Vec<FlowInstance>> {
        self.store.list(filter).await
    }

    /// `getPossibleTransitions(flowId)` — deduplicated union of transition
    /// event names available from the current state(s), in first-seen order.
    pub async fn get_possible_transitions(&self, flow_id: Uuid) -> EngineResult<Vec<String>> {
        let instance = self.get_flow(flow_id).await?;
        let mut seen = std::collections::HashSet::new();
        let mut events = Vec::new();
        for region in instance.current_state.as_regions() {
            for transition in self.definition.candidates_for(&region) {
                if seen.insert(transition.event.clone()) {
                    events.push(transition.event.clone());
                }
            }
        }
        Ok(events)
    }

    /// `recordCompensation(flowId, action, description?)` — spec §4.2 table
    /// / §4.3. Allowed unconditionally, including after `status==completed`
    /// (see DESIGN.md, Open Question 1: the source persists it there too,
    /// even though it is then unreachable).
    pub async fn record_compensation(&self, flow_id: Uuid, action: CompensationAction, description: Option<String>) -> EngineResult<()> {
        let mut instance = self.get_flow(flow_id).await?;
        let state_label = instance.current_state.to_string();
        instance.compensations.push(CompensationEntry { state_label, action: Some(action), timestamp: Utc::now(), description });
        instance.touch();
        self.store.save(instance).await?;
        Ok(())
    }

    /// `startSubFlow(parentFlowId, subDefinition, opts)` — spec §4.2.5. Spins
    /// up an independent `FlowEngine` over the same store for `subDefinition`
    /// and starts it with `parentFlowId` set; `opts.context` falling back to
    /// a copy of the parent's context when unspecified.
    pub async fn start_sub_flow(&self, parent_flow_id: Uuid, sub_definition: FlowDefinition, mut opts: StartOptions) -> EngineResult<FlowInstance> {
        let mut parent = self.get_flow(parent_flow_id).await?;

        if opts.context.is_none() {
            opts.context = Some(parent.context.clone());
        }
        opts.parent_flow_id = Some(parent_flow_id);

        let sub_engine = FlowEngine::new(self.store.clone(), sub_definition);
        let child = sub_engine.start(opts).await?;

        parent.sub_flows.push(SubFlowReference { sub_flow_id: child.flow_id,
                                                  definition_id: child.definition_id.clone(),
                                                  started_in_state: child.current_state.clone(),
                                                  status: sub_flow_status_of(child.status),
                                                  started_at: child.created_at,
                                                  completed_at: None,
                                                  result: None });
        parent.touch();
        self.store.save(parent).await?;
        info!("flow {parent_flow_id} started sub-flow {} ({})", child.flow_id, child.definition_id);
        Ok(child)
    }

    /// `waitForSubFlow(parentFlowId, subFlowId, timeoutMs?)` — spec §4.2.5.
    /// Polls at a 100ms cadence; defensively rejects waiting on oneself per
    /// the recommendation in spec §9.
    pub async fn wait_for_sub_flow(&self, parent_flow_id: Uuid, sub_flow_id: Uuid, timeout_ms: Option<u64>) -> EngineResult<FlowInstance> {
        const POLL_INTERVAL: Duration = Duration::from_millis(100);

        if sub_flow_id == parent_flow_id {
            return Err(EngineError::Internal(format!("flow {parent_flow_id} cannot wait on itself as a sub-flow")));
        }

        let deadline = timeout_ms.map(|ms| tokio::time::Instant::now() + Duration::from_millis(ms));

        loop {
            let child = self.store.get(sub_flow_id).await?.ok_or(EngineError::NotFound { flow_id: sub_flow_id })?;

            if matches!(child.status, FlowStatus::Completed | FlowStatus::Failed) {
                let mut parent = self.get_flow(parent_flow_id).await?;
                if let Some(reference) = parent.sub_flows.iter_mut().find(|r| r.sub_flow_id == sub_flow_id) {
                    reference.status = sub_flow_status_of(child.status);
                    reference.completed_at = Some(Utc::now());
                    reference.result = (child.status == FlowStatus::Completed).then(|| child.context.clone());
                }
                parent.touch();
                self.store.save(parent.clone()).await?;
                return Ok(parent);
            }

            if let Some(deadline) = deadline {
                if tokio::time::Instant::now() >= deadline {
                    return Err(EngineError::Timeout { flow_id: parent_flow_id, sub_flow_id });
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// `delete(flowId)` — best-effort recursive delete of the flow and every
    /// listed sub-flow; errors deleting sub-flows are swallowed (spec
    /// §4.2.5).
    pub async fn delete(&self, flow_id: Uuid) -> EngineResult<()> {
        self.delete_recursive(flow_id).await
    }

    fn delete_recursive<'a>(&'a self, flow_id: Uuid) -> Pin<Box<dyn std::future::Future<Output = EngineResult<()>> + Send + 'a>> {
        Box::pin(async move {
            if let Ok(Some(instance)) = self.store.get(flow_id).await {
                for sub in &instance.sub_flows {
                    let _ = self.delete_recursive(sub.sub_flow_id).await;
                }
            }
            self.store.delete(flow_id).await
        })
    }
}

fn sub_flow_status_of(status: FlowStatus) -> SubFlowStatus {
    match status {
        FlowStatus::Active => SubFlowStatus::Active,
        FlowStatus::Paused => SubFlowStatus::Paused,
        FlowStatus::Compensating => SubFlowStatus::Compensating,
        FlowStatus::Completed => SubFlowStatus::Completed,
        FlowStatus::Failed => SubFlowStatus::Failed,
    }
}
