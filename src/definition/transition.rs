//! Transitions and retry policy (spec §3.1).

use crate::hooks::{ActionFn, GuardFn, ValidationFn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Linear,
    Exponential,
}

/// `{maxAttempts>=0, backoff, delayMs>=0}`. Default: no retry, linear,
/// 1000ms — spec §3.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 0, backoff: Backoff::Linear, delay_ms: 1000 }
    }
}

impl RetryPolicy {
    /// Delay between attempt `i` (0-indexed) and attempt `i+1`.
    pub fn delay_for_attempt(&self, i: u32) -> u64 {
        match self.backoff {
            Backoff::Linear => self.delay_ms * u64::from(i + 1),
            Backoff::Exponential => self.delay_ms * (1u64 << i),
        }
    }
}

/// `{predicate, errorMessage?}` — spec §3.1. The predicate evaluates to
/// `true | false | string`.
#[derive(Clone)]
pub struct Validation {
    pub predicate: ValidationFn,
    pub error_message: Option<String>,
}

impl std::fmt::Debug for Validation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validation").field("error_message", &self.error_message).finish()
    }
}

/// `{event, to, guard?, action?, retry?}` — lives on a state's own
/// `transitions` list, or in the global table keyed by `from`.
#[derive(Clone)]
pub struct Transition {
    pub event: String,
    pub to: String,
    pub guard: Option<GuardFn>,
    pub action: Option<ActionFn>,
    pub retry: RetryPolicy,
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transition")
         .field("event", &self.event)
         .field("to", &self.to)
         .field("has_guard", &self.guard.is_some())
         .field("has_action", &self.action.is_some())
         .field("retry", &self.retry)
         .finish()
    }
}

impl Transition {
    pub fn new(event: impl Into<String>, to: impl Into<String>) -> Self {
        Self { event: event.into(), to: to.into(), guard: None, action: None, retry: RetryPolicy::default() }
    }

    pub fn with_guard(mut self, guard: GuardFn) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_action(mut self, action: ActionFn) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
