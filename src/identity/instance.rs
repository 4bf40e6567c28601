use std::collections::BTreeMap;
use std::sync::Arc;

use super::keys::{CollectionKey, EntityKey};
use crate::domain_model::{CollectionKind, EntityMapping, RepresentationMode};
use crate::value::Value;

/// Index of an entity instance in its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle(pub(crate) usize);

/// Index of a collection in its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionHandle(pub(crate) usize);

/// Identifies one statement execution within a session.
pub type ExecutionId = u64;

/// Largest list position accepted from an index column.
pub const MAX_LIST_INDEX: i64 = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// Registered by key only (a proxy or a not yet fetched collection).
    Uninitialized,
    /// Being populated by the given execution.
    Initializing { execution: ExecutionId },
    Initialized,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Basic(Value),
    Component(BTreeMap<String, Value>),
    /// `None` when the association is null.
    Entity(Option<EntityHandle>),
    Collection(CollectionHandle),
}

/// Attribute storage, laid out per the entity's representation mode.
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceData {
    /// One slot per attribute of the concrete mapping, in mapping order.
    Struct(Vec<Option<AttributeValue>>),
    Map(BTreeMap<String, AttributeValue>),
}

impl InstanceData {
    fn for_mapping(mapping: &EntityMapping) -> Self {
        match mapping.representation {
            RepresentationMode::Struct => InstanceData::Struct(vec![None; mapping.attributes.len()]),
            RepresentationMode::Map => InstanceData::Map(BTreeMap::new()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntityInstance {
    key: EntityKey,
    mapping: Arc<EntityMapping>,
    state: InstanceState,
    version: Option<Value>,
    data: InstanceData,
}

impl EntityInstance {
    pub fn new(key: EntityKey, mapping: Arc<EntityMapping>, state: InstanceState) -> Self {
        let data = InstanceData::for_mapping(&mapping);
        EntityInstance {
            key,
            mapping,
            state,
            version: None,
            data,
        }
    }

    /// Registered by key only; populated when a later row hydrates it.
    pub fn proxy(key: EntityKey, mapping: Arc<EntityMapping>) -> Self {
        Self::new(key, mapping, InstanceState::Uninitialized)
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    pub fn id(&self) -> &Value {
        &self.key.id
    }

    /// Concrete type; for proxies the declared type of the association.
    pub fn mapping(&self) -> &Arc<EntityMapping> {
        &self.mapping
    }

    pub fn entity_name(&self) -> &str {
        &self.mapping.name
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == InstanceState::Initialized
    }

    pub fn version(&self) -> Option<&Value> {
        self.version.as_ref()
    }

    pub fn data(&self) -> &InstanceData {
        &self.data
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        match &self.data {
            InstanceData::Struct(slots) => {
                let (index, _) = self.mapping.attribute(name)?;
                slots.get(index).and_then(Option::as_ref)
            }
            InstanceData::Map(values) => values.get(name),
        }
    }

    /// Populated attributes in mapping order.
    pub fn attributes(&self) -> Vec<(&str, &AttributeValue)> {
        self.mapping
            .attributes
            .iter()
            .filter_map(|a| self.attribute(a.name()).map(|v| (a.name(), v)))
            .collect()
    }

    pub fn basic(&self, name: &str) -> Option<&Value> {
        match self.attribute(name) {
            Some(AttributeValue::Basic(value)) => Some(value),
            _ => None,
        }
    }

    pub fn entity_reference(&self, name: &str) -> Option<EntityHandle> {
        match self.attribute(name) {
            Some(AttributeValue::Entity(handle)) => *handle,
            _ => None,
        }
    }

    pub fn collection_handle(&self, name: &str) -> Option<CollectionHandle> {
        match self.attribute(name) {
            Some(AttributeValue::Collection(handle)) => Some(*handle),
            _ => None,
        }
    }

    /// Returns false when the concrete mapping has no such attribute.
    pub(crate) fn set_attribute(&mut self, name: &str, value: AttributeValue) -> bool {
        match &mut self.data {
            InstanceData::Struct(slots) => match self
                .mapping
                .attribute(name)
                .and_then(|(index, _)| slots.get_mut(index))
            {
                Some(slot) => {
                    *slot = Some(value);
                    true
                }
                None => false,
            },
            InstanceData::Map(values) => {
                if self.mapping.attribute(name).is_none() {
                    return false;
                }
                values.insert(name.to_string(), value);
                true
            }
        }
    }

    pub(crate) fn set_version(&mut self, version: Option<Value>) {
        self.version = version;
    }

    pub(crate) fn set_state(&mut self, state: InstanceState) {
        self.state = state;
    }

    /// Start hydration as `mapping`, discarding anything a proxy held.
    pub(crate) fn begin_hydration(&mut self, mapping: Arc<EntityMapping>, execution: ExecutionId) {
        self.data = InstanceData::for_mapping(&mapping);
        self.mapping = mapping;
        self.version = None;
        self.state = InstanceState::Initializing { execution };
    }

    pub(crate) fn reset(&mut self) {
        self.data = InstanceData::for_mapping(&self.mapping);
        self.version = None;
        self.state = InstanceState::Uninitialized;
    }
}

/// A collection owned by an entity, keyed by role and owner identifier.
#[derive(Debug, Clone)]
pub struct PersistentCollection {
    key: CollectionKey,
    kind: CollectionKind,
    state: InstanceState,
    /// Lists keep holes until every index has been read.
    elements: Vec<Option<EntityHandle>>,
}

impl PersistentCollection {
    pub fn new(key: CollectionKey, kind: CollectionKind, state: InstanceState) -> Self {
        PersistentCollection {
            key,
            kind,
            state,
            elements: Vec::new(),
        }
    }

    pub fn key(&self) -> &CollectionKey {
        &self.key
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == InstanceState::Initialized
    }

    pub fn elements(&self) -> Vec<EntityHandle> {
        self.elements.iter().flatten().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.elements.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bags append, sets ignore repeats, lists place by index (appending
    /// when the index is unknown or above [`MAX_LIST_INDEX`]).
    pub(crate) fn add_element(&mut self, element: EntityHandle, index: Option<i64>) {
        match (self.kind, index) {
            (CollectionKind::Set, _) => {
                if !self.elements.contains(&Some(element)) {
                    self.elements.push(Some(element));
                }
            }
            (CollectionKind::List, Some(index)) if (0..=MAX_LIST_INDEX).contains(&index) => {
                let index = index as usize;
                if self.elements.len() <= index {
                    self.elements.resize(index + 1, None);
                }
                self.elements[index] = Some(element);
            }
            _ => self.elements.push(Some(element)),
        }
    }

    pub(crate) fn set_state(&mut self, state: InstanceState) {
        self.state = state;
    }

    pub(crate) fn begin_initialization(&mut self, execution: ExecutionId) {
        self.elements.clear();
        self.state = InstanceState::Initializing { execution };
    }

    pub(crate) fn reset(&mut self) {
        self.elements.clear();
        self.state = InstanceState::Uninitialized;
    }
}
