//! Saga/compensation procedure (spec §4.3). A free function rather than a
//! `CompensationStack` struct — the stack is just `FlowInstance.compensations`,
//! an append-only `Vec`, so the only behavior worth naming is the unwind
//! procedure itself.

use chrono::Utc;
use log::warn;

use crate::instance::{FlowError, FlowInstance, FlowStatus};
use crate::store::FlowStore;

/// Runs compensation against `instance` for `reason`. Returns whether any
/// compensation actions actually ran (`didCompensate`). Individual action
/// failures are logged and ignored; only a failure persisting the
/// intermediate `compensating` status is treated as the "outer loop raised"
/// case of spec §4.3 step 5.
pub async fn run_compensation(store: &dyn FlowStore, instance: &mut FlowInstance, reason: &str) -> crate::errors::EngineResult<bool> {
    if instance.compensations.is_empty() {
        instance.status = FlowStatus::Failed;
        instance.error = Some(FlowError { message: reason.to_string(), state: instance.current_state.clone(), timestamp: Utc::now() });
        instance.touch();
        return Ok(false);
    }

    instance.status = FlowStatus::Compensating;
    instance.touch();
    if let Err(e) = store.save(instance.clone()).await {
        instance.status = FlowStatus::Failed;
        instance.error = Some(FlowError { message: format!("Compensation failed: {e}"), state: instance.current_state.clone(), timestamp: Utc::now() });
        instance.touch();
        return Ok(false);
    }
    warn!("flow {} entering compensation ({} {} queued): {reason}", instance.flow_id, instance.compensations.len(), if instance.compensations.len() == 1 { "action" } else { "actions" });

    for entry in instance.compensations.iter().rev() {
        if let Some(action) = &entry.action {
            if let Err(e) = action(&mut instance.context).await {
                warn!("flow {} compensation action for state {:?} failed: {e} (ignored, continuing unwind)", instance.flow_id, entry.state_label);
            }
        }
    }

    instance.status = FlowStatus::Failed;
    instance.error = Some(FlowError { message: format!("{reason} (compensated)"), state: instance.current_state.clone(), timestamp: Utc::now() });
    instance.touch();
    Ok(true)
}
