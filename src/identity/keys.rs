use std::fmt;

use crate::navigable::{to_loggable_string, NavigableRole};
use crate::value::Value;

/// Identity of an entity within a unit of work.
///
/// `entity_name` is always the hierarchy root, so a `Dog` and an `Animal`
/// read with the same identifier share one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    pub entity_name: String,
    pub id: Value,
}

impl EntityKey {
    pub fn new(entity_name: impl Into<String>, id: Value) -> Self {
        EntityKey {
            entity_name: entity_name.into(),
            id,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = NavigableRole::root(self.entity_name.as_str());
        f.write_str(&to_loggable_string(Some(&role), Some(&self.id)))
    }
}

/// Identity of a collection: its role and the owner's identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionKey {
    pub role: NavigableRole,
    pub owner_id: Value,
}

impl CollectionKey {
    pub fn new(role: NavigableRole, owner_id: Value) -> Self {
        CollectionKey { role, owner_id }
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_loggable_string(Some(&self.role), Some(&self.owner_id)))
    }
}
