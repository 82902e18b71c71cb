//! `FlowStore` — persistence contract (spec §4.5) and the bundled in-memory
//! reference implementation. Concrete durable backends are an external
//! collaborator (spec §1); this module owns only the trait and the
//! in-memory reference.

pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::engine::options::FlowFilter;
use crate::errors::EngineResult;
use crate::instance::FlowInstance;

pub use memory::InMemoryFlowStore;

#[async_trait]
pub trait FlowStore: Send + Sync {
    /// Create or overwrite by `flowId`. Atomically replaces the prior value.
    async fn save(&self, instance: FlowInstance) -> EngineResult<()>;

    /// Returns a snapshot independent of the stored representation (deep
    /// copy), or `None`.
    async fn get(&self, flow_id: Uuid) -> EngineResult<Option<FlowInstance>>;

    /// No-op if absent.
    async fn delete(&self, flow_id: Uuid) -> EngineResult<()>;

    async fn exists(&self, flow_id: Uuid) -> EngineResult<bool>;

    /// All matching snapshots; filter fields form a conjunction (spec §4.5).
    async fn list(&self, filter: Option<FlowFilter>) -> EngineResult<Vec<FlowInstance>>;

    async fn has_idempotency_key(&self, key: &str) -> EngineResult<bool>;

    async fn save_idempotency_key(&self, key: &str, flow_id: Uuid) -> EngineResult<()>;

    async fn get_flow_id_by_idempotency_key(&self, key: &str) -> EngineResult<Option<Uuid>>;

    /// Optional: all flows whose context matches the given key/value map
    /// exactly. Not every backend can support this efficiently (spec §4.5).
    async fn query_by_context(&self, _query: &Map<String, Value>) -> EngineResult<Vec<FlowInstance>> {
        Ok(Vec::new())
    }
}
