use thiserror::Error;

/// Rendering failures are internal invariant violations: a well-formed
/// statement tree always renders.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("Column '{column}' references table alias '{table_alias}' which is not part of the statement")]
    UnresolvedColumnReference { table_alias: String, column: String },
    #[error("Statement text has {placeholders} placeholders but {bindings} bind descriptors were produced")]
    BindCountMismatch { placeholders: usize, bindings: usize },
    #[error("SELECT list is empty")]
    EmptySelectList,
    #[error("UPDATE has no assignments")]
    EmptyAssignments,
    #[error("IN list is empty")]
    EmptyInList,
    #[error("INSERT row {row} has {found} values for {expected} columns")]
    InsertRowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
}
