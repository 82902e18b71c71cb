//! In-memory reference `FlowStore` (spec §4.5). Uses two `DashMap`s — one
//! `flowId -> instance`, one `key -> flowId` — the same pairing
//! `chem-core::event::InMemoryEventStore`/`InMemoryFlowRepository` split
//! into two stores, and the workspace's `dashmap` dependency this crate
//! inherits. Deep copies flow in and out on every `save`/`get`, so external
//! mutation of a returned snapshot cannot corrupt stored state.
//!
//! Volatile: flows (and any compensation closures they carry) do not survive
//! a process restart — see spec §6.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::engine::options::FlowFilter;
use crate::errors::EngineResult;
use crate::instance::FlowInstance;
use crate::store::FlowStore;

#[derive(Default)]
pub struct InMemoryFlowStore {
    flows: DashMap<Uuid, FlowInstance>,
    idempotency_keys: DashMap<String, Uuid>,
}

impl InMemoryFlowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(instance: &FlowInstance, filter: &FlowFilter) -> bool {
    if let Some(status) = filter.status {
        if instance.status != status {
            return false;
        }
    }
    if let Some(def_id) = &filter.definition_id {
        if &instance.definition_id != def_id {
            return false;
        }
    }
    if let Some(version) = &filter.version {
        if &instance.version != version {
            return false;
        }
    }
    if let Some(parent) = filter.parent_flow_id {
        if instance.parent_flow_id != Some(parent) {
            return false;
        }
    }
    if let Some(states) = &filter.current_state {
        if !states.iter().all(|s| instance.current_state.contains(s)) {
            return false;
        }
    }
    true
}

#[async_trait]
impl FlowStore for InMemoryFlowStore {
    async fn save(&self, instance: FlowInstance) -> EngineResult<()> {
        self.flows.insert(instance.flow_id, instance);
        Ok(())
    }

    async fn get(&self, flow_id: Uuid) -> EngineResult<Option<FlowInstance>> {
        Ok(self.flows.get(&flow_id).map(|e| e.value().clone()))
    }

    async fn delete(&self, flow_id: Uuid) -> EngineResult<()> {
        self.flows.remove(&flow_id);
        Ok(())
    }

    async fn exists(&self, flow_id: Uuid) -> EngineResult<bool> {
        Ok(self.flows.contains_key(&flow_id))
    }

    async fn list(&self, filter: Option<FlowFilter>) -> EngineResult<Vec<FlowInstance>> {
        let out = match filter {
            None => self.flows.iter().map(|e| e.value().clone()).collect(),
            Some(f) => self.flows.iter().filter(|e| matches(e.value(), &f)).map(|e| e.value().clone()).collect(),
        };
        Ok(out)
    }

    async fn has_idempotency_key(&self, key: &str) -> EngineResult<bool> {
        Ok(self.idempotency_keys.contains_key(key))
    }

    async fn save_idempotency_key(&self, key: &str, flow_id: Uuid) -> EngineResult<()> {
        self.idempotency_keys.insert(key.to_string(), flow_id);
        Ok(())
    }

    async fn get_flow_id_by_idempotency_key(&self, key: &str) -> EngineResult<Option<Uuid>> {
        Ok(self.idempotency_keys.get(key).map(|e| *e.value()))
    }

    async fn query_by_context(&self, query: &Map<String, Value>) -> EngineResult<Vec<FlowInstance>> {
        let out = self.flows
                      .iter()
                      .filter(|e| query.iter().all(|(k, v)| e.value().context.as_map().get(k) == Some(v)))
                      .map(|e| e.value().clone())
                      .collect();
        Ok(out)
    }
}
