use thiserror::Error;

use crate::domain_model::DomainModelError;
use crate::query_model::JoinKind;

/// Semantic errors raised while lowering an object query. All of them are
/// fatal for the statement being built.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LoweringError {
    #[error(transparent)]
    Model(#[from] DomainModelError),
    #[error("Unknown identification variable `{alias}`")]
    UnknownAlias { alias: String },
    #[error("Identification variable `{alias}` is declared more than once")]
    DuplicateAlias { alias: String },
    #[error("`{entity}` has no navigable `{navigable}` (in `{path}`)")]
    UnknownNavigable {
        entity: String,
        navigable: String,
        path: String,
    },
    #[error("Cannot dereference collection-valued path `{path}`")]
    IllegalCollectionDereference { path: String },
    #[error("Unsupported use of `{path}`: {reason}")]
    UnsupportedExpression { path: String, reason: String },
    #[error("Path `{path}` was excluded by the fetch depth limit")]
    ExcludedPath { path: String },
    #[error("Fetching `{path}` would cycle back to the association that produced its owner")]
    CyclicFetch { path: String },
    #[error("Cannot simultaneously fetch multiple bags: {paths:?}")]
    MultipleBagFetch { paths: Vec<String> },
    #[error("Query specified join fetching, but the owner of `{path}` is not selected")]
    FetchOwnerNotSelected { path: String },
    #[error("`{path}` is already joined as {existing}; cannot join it again as {requested}")]
    AmbiguousJoin {
        path: String,
        existing: JoinKind,
        requested: JoinKind,
    },
    #[error("Unknown function `{name}`")]
    UnknownFunction { name: String },
    #[error("`{path}` would need a join, which is not allowed in UPDATE/DELETE")]
    JoinInMutation { path: String },
    #[error("INSERT row {row} has {found} values but {expected} attributes were listed")]
    InsertArity {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("`{path}` cannot be assigned")]
    InvalidAssignment { path: String },
}

impl LoweringError {
    pub fn unknown_navigable(entity: &str, navigable: &str, path: impl ToString) -> Self {
        LoweringError::UnknownNavigable {
            entity: entity.to_string(),
            navigable: navigable.to_string(),
            path: path.to_string(),
        }
    }

    pub fn unsupported(path: impl ToString, reason: impl Into<String>) -> Self {
        LoweringError::UnsupportedExpression {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}
