//! # Domain Model Error Types
//!
//! Errors raised while loading and validating mapping metadata. These are all
//! boot-time failures; nothing in the query pipeline produces them once a
//! [`DomainModel`](super::DomainModel) has been built, except lookups of
//! entity names supplied by a query.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DomainModelError {
    #[error("No entity mapping found for `{entity}`")]
    UnknownEntity { entity: String },
    #[error("Entity `{entity}` is defined more than once")]
    DuplicateEntity { entity: String },
    #[error("Attribute `{attribute}` is defined more than once on `{entity}`")]
    DuplicateAttribute { entity: String, attribute: String },
    #[error("Invalid identifier '{name}' in {context}")]
    InvalidIdentifier { name: String, context: String },
    #[error("Unknown representation mode '{mode}' for entity `{entity}` (expected 'struct' or 'map')")]
    UnknownRepresentationMode { entity: String, mode: String },
    #[error("Invalid mapping for `{entity}`: {message}")]
    InvalidMapping { entity: String, message: String },
    #[error("Inheritance cycle detected at `{entity}`")]
    InheritanceCycle { entity: String },
    #[error("Failed to read model file: {error}")]
    ReadError { error: String },
    #[error("Failed to parse model: {error}")]
    ParseError { error: String },
}

impl DomainModelError {
    pub fn invalid_mapping(entity: impl Into<String>, message: impl Into<String>) -> Self {
        DomainModelError::InvalidMapping {
            entity: entity.into(),
            message: message.into(),
        }
    }
}
