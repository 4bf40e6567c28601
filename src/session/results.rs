use std::collections::HashSet;

use serde_json::{json, Map};

use crate::identity::{AttributeValue, CollectionHandle, EntityHandle, IdentityRegistry, InstanceState};
use crate::initializer::ResultValue;

/// Rows returned by [`Session::list`](super::Session::list), one value per
/// select-list item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResults {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<ResultValue>>,
}

impl QueryResults {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Entity handles in `column`, skipping rows where it is null.
    pub fn entities(&self, column: usize) -> Vec<EntityHandle> {
        self.rows
            .iter()
            .filter_map(|row| match row.get(column) {
                Some(ResultValue::Entity(Some(handle))) => Some(*handle),
                _ => None,
            })
            .collect()
    }

    /// Render rows as JSON objects keyed by column label.
    ///
    /// Entities render as `{"$type", "$id", ...attributes}`; an entity already
    /// rendered earlier in the same row becomes `{"$ref": "Type#id"}` and
    /// uninitialized proxies or collections carry `"$uninitialized": true`.
    pub fn to_json(&self, registry: &IdentityRegistry) -> serde_json::Value {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut visited = HashSet::new();
                let mut object = Map::new();
                for (label, value) in self.columns.iter().zip(row) {
                    let rendered = match value {
                        ResultValue::Scalar(value) => value.to_json(),
                        ResultValue::Entity(handle) => entity_json(registry, *handle, &mut visited),
                    };
                    object.insert(label.clone(), rendered);
                }
                serde_json::Value::Object(object)
            })
            .collect();
        serde_json::Value::Array(rows)
    }
}

fn entity_json(
    registry: &IdentityRegistry,
    handle: Option<EntityHandle>,
    visited: &mut HashSet<EntityHandle>,
) -> serde_json::Value {
    let Some(handle) = handle else {
        return serde_json::Value::Null;
    };
    let Some(instance) = registry.entity(handle) else {
        return serde_json::Value::Null;
    };
    if !visited.insert(handle) {
        return json!({ "$ref": instance.key().to_string() });
    }
    let mut object = Map::new();
    object.insert("$type".to_string(), json!(instance.entity_name()));
    object.insert("$id".to_string(), instance.id().to_json());
    if instance.state() == InstanceState::Uninitialized {
        object.insert("$uninitialized".to_string(), json!(true));
        return serde_json::Value::Object(object);
    }
    if let Some(version) = instance.version() {
        object.insert("$version".to_string(), version.to_json());
    }
    for (name, value) in instance.attributes() {
        let rendered = match value {
            AttributeValue::Basic(value) => value.to_json(),
            AttributeValue::Component(parts) => serde_json::Value::Object(
                parts
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            AttributeValue::Entity(target) => entity_json(registry, *target, visited),
            AttributeValue::Collection(collection) => collection_json(registry, *collection, visited),
        };
        object.insert(name.to_string(), rendered);
    }
    serde_json::Value::Object(object)
}

fn collection_json(
    registry: &IdentityRegistry,
    handle: CollectionHandle,
    visited: &mut HashSet<EntityHandle>,
) -> serde_json::Value {
    match registry.collection(handle) {
        Some(collection) if collection.is_initialized() => serde_json::Value::Array(
            collection
                .elements()
                .into_iter()
                .map(|element| entity_json(registry, Some(element), visited))
                .collect(),
        ),
        Some(_) => json!({ "$uninitialized": true }),
        None => serde_json::Value::Null,
    }
}
