//! Option/result types for `FlowEngine` operations (spec §4.2).

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::context::FlowContext;
use crate::instance::{CurrentState, FlowInstance};

#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub flow_id: Option<Uuid>,
    pub idempotency_key: Option<String>,
    /// `None` means "unspecified" — `startSubFlow` falls back to the
    /// parent's context in that case (spec §4.2.5); a top-level `start`
    /// treats `None` as an empty context.
    pub context: Option<FlowContext>,
    pub parent_flow_id: Option<Uuid>,
}

impl StartOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flow_id(mut self, flow_id: Uuid) -> Self {
        self.flow_id = Some(flow_id);
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_context(mut self, context: FlowContext) -> Self {
        self.context = Some(context);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// The event driving the flow forward one step.
    pub event: String,
    pub idempotency_key: Option<String>,
    pub data: Option<Map<String, Value>>,
    /// Zero-based region index for parallel dispatch (spec §4.2.3).
    pub target_region: Option<usize>,
}

impl ExecuteOptions {
    pub fn new(event: impl Into<String>) -> Self {
        Self { event: event.into(), ..Default::default() }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_target_region(mut self, region: usize) -> Self {
        self.target_region = Some(region);
        self
    }
}

/// Result of a single `Transition` taken, as recorded in history (spec §3.2).
#[derive(Debug, Clone)]
pub struct TransitionRecord {
    pub from: CurrentState,
    pub to: CurrentState,
    pub event: String,
}

/// The outcome `execute` always returns (spec §4.2.2/§7: callers never need
/// to distinguish whether compensation ran except by inspecting
/// `compensated`).
#[derive(Debug, Clone)]
pub struct ExecuteResult {
    pub success: bool,
    pub state: FlowInstance,
    pub transition: Option<TransitionRecord>,
    pub compensated: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FlowFilter {
    pub status: Option<crate::instance::FlowStatus>,
    pub definition_id: Option<String>,
    pub version: Option<String>,
    pub parent_flow_id: Option<Uuid>,
    /// Set-membership per spec §4.5: matches if `current_state` contains
    /// every requested state.
    pub current_state: Option<Vec<String>>,
}
