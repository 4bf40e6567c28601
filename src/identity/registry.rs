use std::collections::HashMap;

use log::{debug, trace};

use super::instance::{
    CollectionHandle, EntityHandle, EntityInstance, ExecutionId, InstanceState,
    PersistentCollection,
};
use super::keys::{CollectionKey, EntityKey};

/// Per-session identity map.
///
/// Instances live in an arena and are addressed by handle; the key indexes
/// map value-equal keys to those handles. An instance is registered before it
/// is populated, so a lookup made while it is still being hydrated finds it.
/// Entries are only dropped by [`IdentityRegistry::clear`].
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    entities: Vec<EntityInstance>,
    entity_index: HashMap<EntityKey, EntityHandle>,
    collections: Vec<PersistentCollection>,
    collection_index: HashMap<CollectionKey, CollectionHandle>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        IdentityRegistry::default()
    }

    /// Existing handle for `key`, or a new one holding `supplier()`. The
    /// flag is true when the supplier ran.
    pub fn get_or_create_entity<F>(&mut self, key: &EntityKey, supplier: F) -> (EntityHandle, bool)
    where
        F: FnOnce() -> EntityInstance,
    {
        if let Some(handle) = self.entity_index.get(key) {
            return (*handle, false);
        }
        let handle = EntityHandle(self.entities.len());
        self.entities.push(supplier());
        self.entity_index.insert(key.clone(), handle);
        trace!("Registered entity {} as {:?}", key, handle);
        (handle, true)
    }

    pub fn find_entity(&self, key: &EntityKey) -> Option<EntityHandle> {
        self.entity_index.get(key).copied()
    }

    pub fn entity(&self, handle: EntityHandle) -> Option<&EntityInstance> {
        self.entities.get(handle.0)
    }

    pub(crate) fn entity_mut(&mut self, handle: EntityHandle) -> Option<&mut EntityInstance> {
        self.entities.get_mut(handle.0)
    }

    pub fn get_or_create_collection<F>(
        &mut self,
        key: &CollectionKey,
        supplier: F,
    ) -> (CollectionHandle, bool)
    where
        F: FnOnce() -> PersistentCollection,
    {
        if let Some(handle) = self.collection_index.get(key) {
            return (*handle, false);
        }
        let handle = CollectionHandle(self.collections.len());
        self.collections.push(supplier());
        self.collection_index.insert(key.clone(), handle);
        trace!("Registered collection {} as {:?}", key, handle);
        (handle, true)
    }

    pub fn find_collection(&self, key: &CollectionKey) -> Option<CollectionHandle> {
        self.collection_index.get(key).copied()
    }

    pub fn collection(&self, handle: CollectionHandle) -> Option<&PersistentCollection> {
        self.collections.get(handle.0)
    }

    pub(crate) fn collection_mut(&mut self, handle: CollectionHandle) -> Option<&mut PersistentCollection> {
        self.collections.get_mut(handle.0)
    }

    /// Everything `execution` was populating is now complete.
    pub fn finish_execution(&mut self, execution: ExecutionId) {
        let running = InstanceState::Initializing { execution };
        let mut entities = 0;
        for instance in self.entities.iter_mut().filter(|e| e.state() == running) {
            instance.set_state(InstanceState::Initialized);
            entities += 1;
        }
        let mut collections = 0;
        for collection in self.collections.iter_mut().filter(|c| c.state() == running) {
            collection.set_state(InstanceState::Initialized);
            collections += 1;
        }
        debug!(
            "Execution {} initialized {} entities and {} collections",
            execution, entities, collections
        );
    }

    /// Roll back whatever `execution` left half-populated to key-only entries.
    pub fn abort_execution(&mut self, execution: ExecutionId) {
        let running = InstanceState::Initializing { execution };
        for instance in self.entities.iter_mut().filter(|e| e.state() == running) {
            instance.reset();
        }
        for collection in self.collections.iter_mut().filter(|c| c.state() == running) {
            collection.reset();
        }
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn collection_count(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.collections.is_empty()
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityHandle, &EntityInstance)> {
        self.entities
            .iter()
            .enumerate()
            .map(|(i, instance)| (EntityHandle(i), instance))
    }

    /// Ends the unit of work; every handle handed out so far is invalid.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.entity_index.clear();
        self.collections.clear();
        self.collection_index.clear();
    }
}
