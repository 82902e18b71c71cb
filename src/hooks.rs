//! Deferred, uniformly-async computations injected by the caller: guards,
//! actions, entry/exit hooks and validation predicates (spec §3.1).
//!
//! The core never interprets these — they are opaque callables over the
//! flow's `FlowContext`. Textual-expression evaluation (`eval(expr, ctx)`) is
//! an external collaborator (spec §1) and is never implemented here; callers
//! construct these closures directly, or adapt an `eval` function into one.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::FlowContext;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A guard decides whether a transition fires. A guard that raises is caught
/// by the state machine and treated as "this candidate does not apply" (spec
/// §4.1/§9) — it is never elevated to an execution error.
pub type GuardFn = Arc<dyn Fn(&FlowContext) -> BoxFuture<'static, Result<bool, String>> + Send + Sync>;

/// Actions and entry/exit hooks mutate the context in place and may fail;
/// failure is a real execution error subject to retry.
pub type ActionFn = Arc<dyn Fn(&mut FlowContext) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// A compensation action has the same shape as any other action.
pub type CompensationAction = ActionFn;

/// Result of evaluating a `Validation::predicate` (spec §3.1): `true` passes,
/// `false` fails with the configured/default message, a string fails with
/// that string as the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicateOutcome {
    Pass,
    Fail,
    FailWith(String),
}

pub type ValidationFn = Arc<dyn Fn(&FlowContext) -> BoxFuture<'static, PredicateOutcome> + Send + Sync>;

/// Wraps a synchronous closure into the async hook signature expected by the
/// engine, for callers who have no genuine suspension point.
pub fn sync_action<F>(f: F) -> ActionFn
    where F: Fn(&mut FlowContext) -> Result<(), String> + Send + Sync + 'static
{
    Arc::new(move |ctx: &mut FlowContext| {
        let res = f(ctx);
        Box::pin(async move { res })
    })
}

pub fn sync_guard<F>(f: F) -> GuardFn
    where F: Fn(&FlowContext) -> Result<bool, String> + Send + Sync + 'static
{
    Arc::new(move |ctx: &FlowContext| {
        let res = f(ctx);
        Box::pin(async move { res })
    })
}

pub fn sync_validation<F>(f: F) -> ValidationFn
    where F: Fn(&FlowContext) -> PredicateOutcome + Send + Sync + 'static
{
    Arc::new(move |ctx: &FlowContext| {
        let res = f(ctx);
        Box::pin(async move { res })
    })
}
