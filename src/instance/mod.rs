//! Mutable runtime flow state (spec §3.2).

pub mod flow_instance;

pub use flow_instance::{CompensationEntry, CurrentState, FlowError, FlowInstance, FlowStatus, HistoryRecord, SubFlowReference, SubFlowStatus};
