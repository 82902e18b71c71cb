//! `FlowInstance` — mutable runtime state (spec §3.2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::FlowContext;
use crate::hooks::CompensationAction;

/// `currentState` is either a single state name or a non-empty ordered list
/// of names (one per active parallel region) — spec §3.2 / REDESIGN FLAGS.
/// `#[serde(untagged)]` renders exactly the discriminated string-or-list wire
/// layout mandated by spec §6.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CurrentState {
    Single(String),
    Parallel(Vec<String>),
}

impl CurrentState {
    pub fn region_count(&self) -> usize {
        match self {
            CurrentState::Single(_) => 1,
            CurrentState::Parallel(v) => v.len(),
        }
    }

    pub fn as_regions(&self) -> Vec<String> {
        match self {
            CurrentState::Single(s) => vec![s.clone()],
            CurrentState::Parallel(v) => v.clone(),
        }
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self, CurrentState::Parallel(_))
    }

    /// Set-membership check used by `FlowStore::list`'s `currentState` filter
    /// (spec §4.5): true if `state` is this value, or is among the active
    /// regions for a parallel flow.
    pub fn contains(&self, state: &str) -> bool {
        match self {
            CurrentState::Single(s) => s == state,
            CurrentState::Parallel(v) => v.iter().any(|s| s == state),
        }
    }
}

impl std::fmt::Display for CurrentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CurrentState::Single(s) => write!(f, "{s}"),
            CurrentState::Parallel(v) => write!(f, "[{}]", v.join(", ")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowStatus {
    Active,
    Paused,
    Compensating,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub from: CurrentState,
    pub to: CurrentState,
    pub event: String,
    pub timestamp: DateTime<Utc>,
}

/// A pushed undo action, labelled with the state at recording time (spec
/// §3.2/§4.3). For parallel flows the label is a comma-joined region list.
#[derive(Clone, Serialize, Deserialize)]
pub struct CompensationEntry {
    pub state_label: String,
    /// Opaque callable, excluded from (de)serialization. A durable store must
    /// turn these into named registered actions resolved at replay (spec
    /// §6/§9); the bundled in-memory store does not survive process restart,
    /// which is the documented limitation §6 explicitly allows for.
    #[serde(skip)]
    pub action: Option<CompensationAction>,
    pub timestamp: DateTime<Utc>,
    pub description: Option<String>,
}

impl std::fmt::Debug for CompensationEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompensationEntry")
         .field("state_label", &self.state_label)
         .field("has_action", &self.action.is_some())
         .field("timestamp", &self.timestamp)
         .field("description", &self.description)
         .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubFlowStatus {
    Active,
    Paused,
    Compensating,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubFlowReference {
    pub sub_flow_id: Uuid,
    pub definition_id: String,
    pub started_in_state: CurrentState,
    pub status: SubFlowStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<FlowContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowError {
    pub message: String,
    pub state: CurrentState,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowInstance {
    pub flow_id: Uuid,
    pub definition_id: String,
    pub version: String,
    pub current_state: CurrentState,
    pub context: FlowContext,
    pub status: FlowStatus,
    pub history: Vec<HistoryRecord>,
    pub compensations: Vec<CompensationEntry>,
    pub sub_flows: Vec<SubFlowReference>,
    pub parent_flow_id: Option<Uuid>,
    pub error: Option<FlowError>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FlowInstance {
    pub fn new(flow_id: Uuid, definition_id: impl Into<String>, version: impl Into<String>, current_state: CurrentState, context: FlowContext, parent_flow_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self { flow_id,
               definition_id: definition_id.into(),
               version: version.into(),
               current_state,
               context,
               status: FlowStatus::Active,
               history: Vec::new(),
               compensations: Vec::new(),
               sub_flows: Vec::new(),
               parent_flow_id,
               error: None,
               created_at: now,
               updated_at: now }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
