use std::sync::Arc;

use dashmap::DashMap;

use crate::contract::model::{Collection, ResourceName};

#[derive(Debug, Default)]
struct Slot {
    collection: Arc<Collection>,
    /// Last sequence token handed out for this resource.
    issued: u64,
    /// Sequence token of the request whose response is currently installed.
    applied: u64,
}

/// Canonical collections, one repository slot per resource.
///
/// Readable by anyone; writable only through the pipeline.
#[derive(Debug, Default)]
pub struct CollectionStore {
    slots: DashMap<ResourceName, Slot>,
}

impl CollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current canonical collection; empty until first loaded.
    pub fn get(&self, resource: ResourceName) -> Arc<Collection> {
        self.slots
            .get(&resource)
            .map(|s| s.collection.clone())
            .unwrap_or_default()
    }

    pub fn applied_sequence(&self, resource: ResourceName) -> u64 {
        self.slots.get(&resource).map_or(0, |s| s.applied)
    }

    /// Token for a request being dispatched now; strictly increasing per resource.
    pub(crate) fn next_sequence(&self, resource: ResourceName) -> u64 {
        let mut slot = self.slots.entry(resource).or_default();
        slot.issued += 1;
        slot.issued
    }

    /// Full replacement regardless of order: the last response to arrive wins.
    pub(crate) fn replace(
        &self,
        resource: ResourceName,
        collection: Collection,
        sequence: u64,
    ) -> Arc<Collection> {
        let collection = Arc::new(collection);
        let mut slot = self.slots.entry(resource).or_default();
        slot.collection = collection.clone();
        slot.applied = sequence;
        collection
    }

    /// Full replacement only if `sequence` is newer than the installed response.
    pub(crate) fn replace_if_newer(
        &self,
        resource: ResourceName,
        collection: Collection,
        sequence: u64,
    ) -> Option<Arc<Collection>> {
        let mut slot = self.slots.entry(resource).or_default();
        if sequence <= slot.applied {
            return None;
        }
        let collection = Arc::new(collection);
        slot.collection = collection.clone();
        slot.applied = sequence;
        Some(collection)
    }
}
