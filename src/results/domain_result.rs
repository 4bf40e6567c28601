use std::sync::Arc;

use super::assembler::BasicAssembler;
use crate::domain_model::{AssociationMapping, EntityMapping};
use crate::navigable::NavigablePath;

/// What the caller receives for one select-list item.
#[derive(Debug, Clone)]
pub enum DomainResult {
    Entity(EntityResult),
    Scalar(ScalarResult),
}

impl DomainResult {
    pub fn label(&self) -> &str {
        match self {
            DomainResult::Entity(entity) => &entity.label,
            DomainResult::Scalar(scalar) => &scalar.label,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScalarResult {
    pub label: String,
    pub assembler: BasicAssembler,
}

/// An entity at one navigable path together with everything needed to key,
/// type and populate it.
#[derive(Debug, Clone)]
pub struct EntityResult {
    pub label: String,
    pub navigable_path: NavigablePath,
    /// Declared type; rows may name a concrete subtype through the
    /// discriminator.
    pub entity: Arc<EntityMapping>,
    pub identifier: BasicAssembler,
    pub discriminator: Option<BasicAssembler>,
    pub version: Option<BasicAssembler>,
    /// One per attribute of the declared type and its subtypes.
    pub fetches: Vec<Fetch>,
}

impl EntityResult {
    pub fn fetch(&self, attribute: &str) -> Option<&Fetch> {
        self.fetches.iter().find(|f| f.attribute_name() == attribute)
    }
}

#[derive(Debug, Clone)]
pub enum Fetch {
    Basic {
        attribute: String,
        assembler: BasicAssembler,
    },
    Embedded {
        attribute: String,
        components: Vec<(String, BasicAssembler)>,
    },
    /// To-one association joined in this statement.
    EntityJoined {
        attribute: String,
        result: Box<EntityResult>,
    },
    /// To-one association not joined; the foreign key keys a proxy.
    EntityDelayed {
        attribute: String,
        target: Arc<EntityMapping>,
        foreign_key: BasicAssembler,
    },
    /// Collection joined in this statement.
    CollectionJoined {
        attribute: String,
        association: AssociationMapping,
        element: Box<EntityResult>,
        /// List position, for `list` collections.
        index: Option<BasicAssembler>,
    },
    /// Collection left for later; only its key is registered.
    CollectionDelayed {
        attribute: String,
        association: AssociationMapping,
    },
}

impl Fetch {
    pub fn attribute_name(&self) -> &str {
        match self {
            Fetch::Basic { attribute, .. }
            | Fetch::Embedded { attribute, .. }
            | Fetch::EntityJoined { attribute, .. }
            | Fetch::EntityDelayed { attribute, .. }
            | Fetch::CollectionJoined { attribute, .. }
            | Fetch::CollectionDelayed { attribute, .. } => attribute,
        }
    }
}
