//! Domain-model metadata: entities, their tables, columns, associations and
//! value mappings.
//!
//! The pipeline never invents mapping information; every table, column and
//! join predicate it emits comes from a [`DomainModel`] built here from a YAML
//! [`DomainModelConfig`].

pub mod config;
pub mod errors;
pub mod model;
pub mod value_mapping;

#[cfg(test)]
pub mod testing;

pub use config::{
    AssociationKind, CollectionKind, DomainModelConfig, EntityDefinition, FetchTiming,
};
pub use errors::DomainModelError;
pub use model::{
    AssociationJoin, AssociationMapping, AttributeMapping, BasicAttribute, CollectionSemantics,
    ColumnMapping, DiscriminatorMapping, DomainModel, EmbeddedAttribute, EntityMapping,
    RepresentationMode,
};
pub use value_mapping::{SqlType, ValueConversionError, ValueMapping};
