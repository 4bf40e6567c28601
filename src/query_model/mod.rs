//! Object-model query tree.
//!
//! Queries are expressed in domain terms: entity names, identification
//! variables (aliases) and dotted attribute paths. Nothing here knows about
//! tables or columns; the [`converter`](crate::converter) lowers these nodes to
//! the relational statement tree.

use std::fmt;

use serde::{Deserialize, Serialize};

mod expression;

pub use expression::{BinaryOperator, Expression, Literal, ParameterRef, PathExpression};

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum ObjectStatement {
    Select(SelectQuery),
    Insert(InsertQuery),
    Update(UpdateQuery),
    Delete(DeleteQuery),
}

impl ObjectStatement {
    pub fn is_select(&self) -> bool {
        matches!(self, ObjectStatement::Select(_))
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct FromSpec {
    pub entity: String,
    pub alias: String,
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinKind::Inner => write!(f, "inner"),
            JoinKind::Left => write!(f, "left"),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct JoinSpec {
    /// `alias.association[.association...]`
    pub path: PathExpression,
    pub alias: Option<String>,
    pub kind: JoinKind,
    pub fetch: bool,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Selection {
    pub expression: Expression,
    pub alias: Option<String>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SortItem {
    pub expression: Expression,
    pub descending: bool,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SelectQuery {
    pub distinct: bool,
    /// Empty means "select the root alias".
    pub selections: Vec<Selection>,
    pub from: FromSpec,
    pub joins: Vec<JoinSpec>,
    pub restriction: Option<Expression>,
    pub group_by: Vec<Expression>,
    pub having: Option<Expression>,
    pub order_by: Vec<SortItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SelectQuery {
    /// `FROM entity alias` with nothing else.
    pub fn from_entity(entity: impl Into<String>, alias: impl Into<String>) -> Self {
        SelectQuery {
            distinct: false,
            selections: Vec::new(),
            from: FromSpec {
                entity: entity.into(),
                alias: alias.into(),
            },
            joins: Vec::new(),
            restriction: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub target: PathExpression,
    pub value: Expression,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct UpdateQuery {
    pub target: FromSpec,
    pub assignments: Vec<Assignment>,
    pub restriction: Option<Expression>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DeleteQuery {
    pub target: FromSpec,
    pub restriction: Option<Expression>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InsertQuery {
    pub entity: String,
    /// Attribute names; the identifier name is allowed.
    pub attributes: Vec<String>,
    pub rows: Vec<Vec<Expression>>,
}
