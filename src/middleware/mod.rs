//! Around-advice wrapping each `execute` call (spec §4.4).

pub mod chain;

pub use chain::{BoxFuture, CoreStep, Middleware, MiddlewareChain, MiddlewareContext, Next};
