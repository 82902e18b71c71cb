//! Error taxonomy for the flow engine (spec §7).
//!
//! Operational errors (`NotFound`, `Duplicate`, `NotActive`, `Timeout`) are
//! raised synchronously to the caller and never mutate flow state. Execution
//! errors (everything else) are captured into a `TransitionOutcome` /
//! `ExecuteResult`, drive the compensation path, and end up recorded in
//! `FlowInstance.error`.

use uuid::Uuid;

use crate::instance::FlowStatus;

#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("flow {flow_id} not found")]
    NotFound { flow_id: Uuid },

    #[error("flow {flow_id} already exists")]
    Duplicate { flow_id: Uuid },

    #[error("flow {flow_id} is not active (status={status:?})")]
    NotActive { flow_id: Uuid, status: FlowStatus },

    #[error("no transition for event {event:?} from state {state}")]
    NoTransition { state: String, event: String },

    #[error("no region accepted event {event:?}")]
    NoRegionAccepted { event: String },

    #[error("region index {index} out of range (have {region_count} regions)")]
    InvalidRegion { index: usize, region_count: usize },

    #[error("transition from region {region} targets a parallel state, which is not allowed")]
    NestedParallel { region: String },

    #[error("validation failed for state {state}: {message}")]
    ValidationFailed { state: String, message: String },

    #[error("hook error in state {state}: {message}")]
    HookError { state: String, message: String },

    #[error("timeout waiting for sub-flow {sub_flow_id:?} of flow {flow_id}")]
    Timeout { flow_id: Uuid, sub_flow_id: Uuid },

    #[error("internal engine error: {0}")]
    Internal(String),
}

impl EngineError {
    /// True for errors that are captured into `FlowInstance.error` and drive
    /// compensation, rather than being raised synchronously to the caller.
    pub fn is_execution_error(&self) -> bool {
        matches!(self,
                 EngineError::NoTransition { .. }
                 | EngineError::NoRegionAccepted { .. }
                 | EngineError::InvalidRegion { .. }
                 | EngineError::NestedParallel { .. }
                 | EngineError::ValidationFailed { .. }
                 | EngineError::HookError { .. })
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
