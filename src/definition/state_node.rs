//! `StateNode`, modelled as a closed sum per the REDESIGN FLAGS in spec §9
//! rather than the source's duck-typed `{type?, ...}` shape.

use crate::definition::transition::{Transition, Validation};
use crate::hooks::ActionFn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicKind {
    Atomic,
    Final,
}

#[derive(Clone)]
pub struct AtomicState {
    pub name: String,
    pub kind: AtomicKind,
    pub transitions: Vec<Transition>,
    pub on_entry: Option<ActionFn>,
    pub on_exit: Option<ActionFn>,
    pub validation: Option<Validation>,
}

impl std::fmt::Debug for AtomicState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicState")
         .field("name", &self.name)
         .field("kind", &self.kind)
         .field("transitions", &self.transitions)
         .finish()
    }
}

impl AtomicState {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: AtomicKind::Atomic, transitions: Vec::new(), on_entry: None, on_exit: None, validation: None }
    }

    pub fn final_state(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: AtomicKind::Final, transitions: Vec::new(), on_entry: None, on_exit: None, validation: None }
    }
}

/// One concurrently-active sub-axis of a `ParallelState` (spec §3.1 Region /
/// GLOSSARY).
#[derive(Debug, Clone)]
pub struct Region {
    pub name: String,
    pub initial_state: String,
    /// Atomic-state names that belong to this region.
    pub states: Vec<String>,
}

#[derive(Clone)]
pub struct ParallelState {
    pub name: String,
    pub regions: Vec<Region>,
    pub on_entry: Option<ActionFn>,
    pub on_exit: Option<ActionFn>,
    /// Accepted into the data model per spec §3.1; the dispatch algorithm of
    /// §4.2.3 operates strictly per-region, so these are never consulted by
    /// the executor directly (see DESIGN.md).
    pub transitions: Vec<Transition>,
}

impl std::fmt::Debug for ParallelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelState").field("name", &self.name).field("regions", &self.regions).finish()
    }
}

impl ParallelState {
    pub fn new(name: impl Into<String>, regions: Vec<Region>) -> Self {
        Self { name: name.into(), regions, on_entry: None, on_exit: None, transitions: Vec::new() }
    }
}

#[derive(Clone)]
pub struct CompoundState {
    pub name: String,
    pub initial_sub_state: String,
    pub child_states: Vec<String>,
    pub on_entry: Option<ActionFn>,
    pub on_exit: Option<ActionFn>,
    pub is_final: bool,
}

impl std::fmt::Debug for CompoundState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompoundState")
         .field("name", &self.name)
         .field("initial_sub_state", &self.initial_sub_state)
         .field("child_states", &self.child_states)
         .field("is_final", &self.is_final)
         .finish()
    }
}

impl CompoundState {
    pub fn new(name: impl Into<String>, initial_sub_state: impl Into<String>, child_states: Vec<String>) -> Self {
        Self { name: name.into(), initial_sub_state: initial_sub_state.into(), child_states, on_entry: None, on_exit: None, is_final: false }
    }
}

#[derive(Debug, Clone)]
pub enum StateNode {
    Atomic(AtomicState),
    Parallel(ParallelState),
    Compound(CompoundState),
}

impl StateNode {
    pub fn name(&self) -> &str {
        match self {
            StateNode::Atomic(s) => &s.name,
            StateNode::Parallel(s) => &s.name,
            StateNode::Compound(s) => &s.name,
        }
    }

    /// `isFinal(stateName)` — spec §4.1. True iff the node is `kind=final`,
    /// or a compound node with explicit `isFinal=true`.
    pub fn is_final(&self) -> bool {
        match self {
            StateNode::Atomic(s) => s.kind == AtomicKind::Final,
            StateNode::Parallel(_) => false,
            StateNode::Compound(s) => s.is_final,
        }
    }

    pub fn on_entry(&self) -> Option<&ActionFn> {
        match self {
            StateNode::Atomic(s) => s.on_entry.as_ref(),
            StateNode::Parallel(s) => s.on_entry.as_ref(),
            StateNode::Compound(s) => s.on_entry.as_ref(),
        }
    }

    pub fn on_exit(&self) -> Option<&ActionFn> {
        match self {
            StateNode::Atomic(s) => s.on_exit.as_ref(),
            StateNode::Parallel(s) => s.on_exit.as_ref(),
            StateNode::Compound(s) => s.on_exit.as_ref(),
        }
    }

    /// Transitions declared directly on this node (atomic/parallel only; a
    /// compound node declares none of its own per spec §3.1 — transitions
    /// into/out of a compound state come from the global table).
    pub fn own_transitions(&self) -> &[Transition] {
        match self {
            StateNode::Atomic(s) => &s.transitions,
            StateNode::Parallel(s) => &s.transitions,
            StateNode::Compound(_) => &[],
        }
    }

    pub fn validation(&self) -> Option<&Validation> {
        match self {
            StateNode::Atomic(s) => s.validation.as_ref(),
            _ => None,
        }
    }
}
