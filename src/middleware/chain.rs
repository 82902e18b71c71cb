//! `MiddlewareChain` — around-advice wrapping each `execute` call (spec
//! §4.4). Grounded on the `async_trait`-based provider traits in
//! `chem-domain`/`chem-adapters`, composed here as a recursive onion
//! (`Next`) rather than a flat provider registry.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::engine::options::{ExecuteOptions, ExecuteResult};
use crate::errors::EngineResult;
use crate::instance::FlowInstance;

/// `{flowId, event, flowState (snapshot at entry), options, startTime}` —
/// spec §4.4.
pub struct MiddlewareContext {
    pub flow_id: Uuid,
    pub event: String,
    pub flow_state: FlowInstance,
    pub options: ExecuteOptions,
    pub start_time: DateTime<Utc>,
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The terminal core-execute step: generic over the borrow lifetime of the
/// context it is handed, so it can be stored once per `dispatch` call and
/// invoked at any recursion depth.
pub type CoreStep = dyn for<'c> Fn(&'c mut MiddlewareContext) -> BoxFuture<'c, EngineResult<ExecuteResult>> + Send + Sync;

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: &mut MiddlewareContext, next: Next<'_>) -> EngineResult<ExecuteResult>;
}

/// The remaining middleware stack plus the terminal core step. `next.run()`
/// either invokes the next middleware or, at the tail, the core execute
/// step — a middleware that never calls it short-circuits the chain (spec
/// §4.4).
pub struct Next<'a> {
    middlewares: &'a [Arc<dyn Middleware>],
    core: &'a CoreStep,
}

impl<'a> Next<'a> {
    pub async fn run(self, ctx: &mut MiddlewareContext) -> EngineResult<ExecuteResult> {
        if let Some((first, rest)) = self.middlewares.split_first() {
            let next = Next { middlewares: rest, core: self.core };
            first.handle(ctx, next).await
        } else {
            (self.core)(ctx).await
        }
    }
}

/// Registration order determines outer -> inner nesting (first `use` is
/// outermost).
#[derive(Default, Clone)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn use_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    pub fn clear(&mut self) {
        self.middlewares.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Runs the chain with `core` as its terminus. When the chain is empty
    /// the core step runs directly (spec §4.4: important so a pre-execute
    /// `status==active` check observes the latest persisted state).
    pub async fn dispatch(&self, ctx: &mut MiddlewareContext, core: &CoreStep) -> EngineResult<ExecuteResult> {
        let next = Next { middlewares: &self.middlewares, core };
        next.run(ctx).await
    }
}
