use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::contract::model::{Collection, Entity, ResourceName};
use crate::domain::error::ServiceError;
use crate::domain::ports::MutationService;

/// Process-local Mutation Service; entities are JSON objects keyed by their `id` field.
#[derive(Debug, Default)]
pub struct InMemoryMutationService {
    data: DashMap<ResourceName, Collection>,
    next_id: AtomicU64,
}

impl InMemoryMutationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, resource: ResourceName, collection: Collection) {
        self.data.insert(resource, collection);
    }

    fn snapshot(&self, resource: ResourceName) -> Collection {
        self.data
            .get(&resource)
            .map(|c| c.value().clone())
            .unwrap_or_default()
    }
}

fn entity_id(entity: &Entity) -> Option<String> {
    match entity.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn require_object(payload: Entity) -> Result<serde_json::Map<String, Value>, ServiceError> {
    match payload {
        Value::Object(map) => Ok(map),
        _ => Err(ServiceError::status(422, "payload must be a JSON object")),
    }
}

fn not_found(resource: ResourceName, id: &str) -> ServiceError {
    ServiceError::status(404, format!("{resource} entity '{id}' not found"))
}

#[async_trait]
impl MutationService for InMemoryMutationService {
    async fn list(&self, resource: ResourceName) -> Result<Collection, ServiceError> {
        Ok(self.snapshot(resource))
    }

    async fn create(
        &self,
        resource: ResourceName,
        payload: Entity,
    ) -> Result<Collection, ServiceError> {
        let mut object = require_object(payload)?;
        if !object.contains_key("id") {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
            object.insert("id".into(), Value::String(id.to_string()));
        }

        let mut entry = self.data.entry(resource).or_default();
        entry.push(Value::Object(object));
        Ok(entry.value().clone())
    }

    async fn update(
        &self,
        resource: ResourceName,
        id: &str,
        payload: Entity,
    ) -> Result<Collection, ServiceError> {
        let mut object = require_object(payload)?;
        let mut entry = self.data.entry(resource).or_default();
        let slot = entry
            .iter_mut()
            .find(|e| entity_id(e).as_deref() == Some(id))
            .ok_or_else(|| not_found(resource, id))?;

        // The path id is authoritative.
        object.insert("id".into(), slot.get("id").cloned().unwrap_or(Value::Null));
        *slot = Value::Object(object);
        Ok(entry.value().clone())
    }

    async fn delete(&self, resource: ResourceName, id: &str) -> Result<Collection, ServiceError> {
        let mut entry = self.data.entry(resource).or_default();
        let before = entry.len();
        entry.retain(|e| entity_id(e).as_deref() != Some(id));
        if entry.len() == before {
            return Err(not_found(resource, id));
        }
        Ok(entry.value().clone())
    }
}
