//! Builder for `FlowEngine`, mirroring `chem-core::engine::builder`'s
//! state-carrying builder shape (runtime-checked here rather than
//! compile-time-checked, since a `FlowDefinition`'s shape is supplied by the
//! external parser, not assembled step-by-step in Rust).

use std::sync::Arc;

use crate::definition::FlowDefinition;
use crate::engine::flow_engine::FlowEngine;
use crate::middleware::{Middleware, MiddlewareChain};
use crate::store::FlowStore;

pub struct FlowEngineBuilder {
    store: Arc<dyn FlowStore>,
    middleware: MiddlewareChain,
}

impl FlowEngineBuilder {
    pub fn new(store: Arc<dyn FlowStore>) -> Self {
        Self { store, middleware: MiddlewareChain::new() }
    }

    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.use_middleware(middleware);
        self
    }

    pub fn build(self, definition: FlowDefinition) -> FlowEngine {
        FlowEngine::new_with_middleware(self.store, definition, self.middleware)
    }
}
