//! `FlowDefinition` — immutable configuration (spec §3.1), validated at
//! construction the same way `chem-core::repo::build_flow_definition`
//! validates/hashes a pipeline before handing it to the engine.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::definition::state_node::{CompoundState, StateNode};
use crate::definition::transition::Transition;
use crate::errors::{EngineError, EngineResult};
use crate::hooks::ActionFn;

/// Global transition table entry: transitions attached to a `from` state
/// outside of that state's own node (spec §3.1: "Transitions live on the
/// source state or in a global table keyed by `from`.").
#[derive(Debug, Clone, Default)]
pub struct GlobalTransitions(pub HashMap<String, Vec<Transition>>);

#[derive(Debug, Clone)]
pub struct FlowDefinition {
    pub id: String,
    pub version: String,
    pub initial_state: String,
    /// Declaration order preserved (`IndexMap`) so iteration is deterministic
    /// even though lookups are by name.
    pub states: IndexMap<String, StateNode>,
    pub global_transitions: GlobalTransitions,
    pub on_error: Option<ActionFn>,
}

impl FlowDefinition {
    pub fn builder(id: impl Into<String>, version: impl Into<String>, initial_state: impl Into<String>) -> FlowDefinitionBuilder {
        FlowDefinitionBuilder { id: id.into(),
                                 version: version.into(),
                                 initial_state: initial_state.into(),
                                 states: IndexMap::new(),
                                 global_transitions: GlobalTransitions::default(),
                                 on_error: None }
    }

    pub fn state(&self, name: &str) -> Option<&StateNode> {
        self.states.get(name)
    }

    /// Candidate transitions for `from`, in collection order: the state's own
    /// transitions first, then the global table (spec §4.1 Resolution).
    pub fn candidates_for(&self, from: &str) -> Vec<&Transition> {
        let mut out = Vec::new();
        if let Some(node) = self.states.get(from) {
            out.extend(node.own_transitions().iter());
        }
        if let Some(global) = self.global_transitions.0.get(from) {
            out.extend(global.iter());
        }
        out
    }

    /// Resolves the initial leaf for a state that may be a compound wrapper:
    /// a compound's `initialSubState` is entered immediately, so `currentState`
    /// always holds an atomic/parallel name (see DESIGN.md, Open Question
    /// resolution for compound runtime semantics).
    pub fn resolve_leaf(&self, name: &str) -> EngineResult<&str> {
        match self.states.get(name) {
            Some(StateNode::Compound(c)) => Ok(&c.initial_sub_state),
            Some(_) => Ok(name),
            None => Err(EngineError::Internal(format!("unknown state {name}"))),
        }
    }

    /// `isFinal` check that accounts for the state possibly being the name of
    /// a compound whose current leaf was already resolved elsewhere — callers
    /// pass the *current* (already-resolved) state name here.
    pub fn is_final(&self, name: &str) -> bool {
        self.states.get(name).map(|n| n.is_final()).unwrap_or(false)
    }
}

pub struct FlowDefinitionBuilder {
    id: String,
    version: String,
    initial_state: String,
    states: IndexMap<String, StateNode>,
    global_transitions: GlobalTransitions,
    on_error: Option<ActionFn>,
}

impl FlowDefinitionBuilder {
    pub fn with_state(mut self, node: StateNode) -> Self {
        self.states.insert(node.name().to_string(), node);
        self
    }

    pub fn with_global_transition(mut self, from: impl Into<String>, transition: Transition) -> Self {
        self.global_transitions.0.entry(from.into()).or_default().push(transition);
        self
    }

    pub fn with_on_error(mut self, action: ActionFn) -> Self {
        self.on_error = Some(action);
        self
    }

    /// Performs the §3.1 construction-time invariant checks and returns the
    /// immutable `FlowDefinition`.
    pub fn build(self) -> EngineResult<FlowDefinition> {
        let def = FlowDefinition { id: self.id,
                                    version: self.version,
                                    initial_state: self.initial_state,
                                    states: self.states,
                                    global_transitions: self.global_transitions,
                                    on_error: self.on_error };
        validate(&def)?;
        Ok(def)
    }
}

fn validate(def: &FlowDefinition) -> EngineResult<()> {
    if !def.states.contains_key(&def.initial_state) {
        return Err(EngineError::Internal(format!("initialState {:?} does not exist", def.initial_state)));
    }

    for node in def.states.values() {
        let all_transitions = node.own_transitions().iter().chain(def.global_transitions.0.get(node.name()).into_iter().flatten());
        for t in all_transitions {
            if !def.states.contains_key(&t.to) {
                return Err(EngineError::Internal(format!("transition {}->{} (event {}) targets unknown state", node.name(), t.to, t.event)));
            }
        }

        match node {
            StateNode::Compound(c) => validate_compound(def, c)?,
            StateNode::Parallel(p) => {
                for region in &p.regions {
                    if !region.states.contains(&region.initial_state) {
                        return Err(EngineError::Internal(format!("region {} initialState {:?} not listed in its own states", region.name, region.initial_state)));
                    }
                    for s in &region.states {
                        match def.states.get(s) {
                            Some(StateNode::Atomic(_)) => {}
                            Some(_) => {
                                return Err(EngineError::Internal(format!("region {} state {:?} must reference an atomic state", region.name, s)))
                            }
                            None => return Err(EngineError::Internal(format!("region {} references unknown state {:?}", region.name, s))),
                        }
                    }
                }
            }
            StateNode::Atomic(_) => {}
        }
    }

    Ok(())
}

fn validate_compound(def: &FlowDefinition, c: &CompoundState) -> EngineResult<()> {
    if !c.child_states.contains(&c.initial_sub_state) {
        return Err(EngineError::Internal(format!("compound {} initialSubState {:?} not among childStates", c.name, c.initial_sub_state)));
    }
    for child in &c.child_states {
        match def.states.get(child) {
            Some(StateNode::Compound(_)) => {
                return Err(EngineError::Internal(format!("compound {} child {:?} must not itself be compound (single-level nesting only)", c.name, child)))
            }
            Some(_) => {}
            None => return Err(EngineError::Internal(format!("compound {} references unknown child {:?}", c.name, child))),
        }
    }
    Ok(())
}
