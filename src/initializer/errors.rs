use thiserror::Error;

use crate::domain_model::ValueConversionError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum HydrationErrorKind {
    #[error("identifier has an unexpected type: {0}")]
    UnexpectedIdentifierType(ValueConversionError),
    #[error("value conversion failed: {0}")]
    Conversion(ValueConversionError),
    #[error("instance registered as `{existing}` cannot be read as `{requested}`")]
    IncompatibleInstance { existing: String, requested: String },
    #[error("unknown discriminator value '{value}' for `{entity}`")]
    UnknownDiscriminator { entity: String, value: String },
    #[error("row has {width} columns, position {position} was requested")]
    RowShape { position: usize, width: usize },
    #[error("list index {index} is outside 0..={max}")]
    ListIndex { index: i64, max: i64 },
    #[error("registry handle is no longer valid")]
    StaleHandle,
}

/// A row that could not be hydrated. `path` is the loggable form of the
/// navigable path and key being processed; `row` is 0-based.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Hydration failed at {path} (row {row}): {kind}")]
pub struct HydrationError {
    pub path: String,
    pub row: usize,
    pub kind: HydrationErrorKind,
}
