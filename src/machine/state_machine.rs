//! `StateMachine` — single-step transition executor (spec §4.1).

use std::time::Duration;

use log::debug;

use crate::context::FlowContext;
use crate::definition::{FlowDefinition, Transition};
use crate::hooks::PredicateOutcome;

#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    Success { from: String, to: String, event: String },
    Failure { from: String, event: String, error: String },
}

impl TransitionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransitionOutcome::Success { .. })
    }
}

#[derive(Debug, Default)]
pub struct StateMachine;

impl StateMachine {
    pub fn new() -> Self {
        Self
    }

    /// `executeTransition(currentState, event, context) -> TransitionOutcome`
    /// (spec §4.1). `context` is mutated in place on the path taken.
    pub async fn execute_transition(&self, definition: &FlowDefinition, current_state: &str, event: &str, context: &mut FlowContext) -> TransitionOutcome {
        let Some(transition) = self.resolve(definition, current_state, event, context).await else {
            return TransitionOutcome::Failure { from: current_state.to_string(),
                                                  event: event.to_string(),
                                                  error: format!("no transition for event {event:?} from state {current_state:?}") };
        };

        let attempts_total = transition.retry.max_attempts + 1;
        let mut last_error = String::new();

        for attempt in 0..attempts_total {
            if attempt > 0 {
                let delay = transition.retry.delay_for_attempt(attempt - 1);
                debug!("retrying transition {current_state}->{} (event {event}) attempt {attempt}/{attempts_total} after {delay}ms", transition.to);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match self.attempt_once(definition, current_state, transition, context).await {
                Ok(to) => {
                    return TransitionOutcome::Success { from: current_state.to_string(), to, event: event.to_string() };
                }
                Err(e) => last_error = e,
            }
        }

        if let Some(on_error) = &definition.on_error {
            let _ = on_error(context).await;
        }

        TransitionOutcome::Failure { from: current_state.to_string(), event: event.to_string(), error: last_error }
    }

    /// Candidate resolution: first transition matching `event` whose guard is
    /// absent or truthy. A guard that raises is treated as "does not apply"
    /// and the search continues (spec §4.1/§9).
    async fn resolve<'a>(&self, definition: &'a FlowDefinition, current_state: &str, event: &str, context: &FlowContext) -> Option<&'a Transition> {
        for candidate in definition.candidates_for(current_state) {
            if candidate.event != event {
                continue;
            }
            match &candidate.guard {
                None => return Some(candidate),
                Some(guard) => match guard(context).await {
                    Ok(true) => return Some(candidate),
                    Ok(false) => continue,
                    Err(e) => {
                        debug!("guard for {current_state}->{} (event {event}) raised: {e}; treated as non-match", candidate.to);
                        continue;
                    }
                },
            }
        }
        None
    }

    /// Steps 1-4 of a single attempt: exit, action, validate target, entry.
    async fn attempt_once(&self, definition: &FlowDefinition, from: &str, transition: &Transition, context: &mut FlowContext) -> Result<String, String> {
        if let Some(node) = definition.state(from) {
            if let Some(on_exit) = node.on_exit() {
                on_exit(context).await.map_err(|e| format!("onExit({from}) failed: {e}"))?;
            }
        }

        if let Some(action) = &transition.action {
            action(context).await.map_err(|e| format!("action({from}->{}) failed: {e}", transition.to))?;
        }

        // If `transition.to` names a compound state, its onEntry fires before
        // the resolved leaf's own onEntry (outer-then-inner), then the leaf
        // becomes the resting `currentState` (see DESIGN.md).
        if let Some(compound_node) = definition.state(&transition.to) {
            if let Some(on_entry) = compound_node.on_entry() {
                if definition.resolve_leaf(&transition.to).map(|leaf| leaf != transition.to).unwrap_or(false) {
                    on_entry(context).await.map_err(|e| format!("onEntry({}) failed: {e}", transition.to))?;
                }
            }
        }

        let target_name = definition.resolve_leaf(&transition.to).map_err(|e| e.to_string())?;

        if let Some(target_node) = definition.state(target_name) {
            if let Some(validation) = target_node.validation() {
                match (validation.predicate)(context).await {
                    PredicateOutcome::Pass => {}
                    PredicateOutcome::Fail => {
                        return Err(validation.error_message.clone().unwrap_or_else(|| format!("validation failed for state {target_name}")));
                    }
                    PredicateOutcome::FailWith(msg) => return Err(msg),
                }
            }

            if let Some(on_entry) = target_node.on_entry() {
                on_entry(context).await.map_err(|e| format!("onEntry({target_name}) failed: {e}"))?;
            }
        }

        Ok(target_name.to_string())
    }

    pub fn is_final(&self, definition: &FlowDefinition, state_name: &str) -> bool {
        definition.is_final(state_name)
    }
}
