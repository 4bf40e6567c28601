//! Lowering of object-model statements to the relational statement tree.
//!
//! One [`QueryConverter`](walker::QueryConverter) walks one statement top-down.
//! It owns the statement's [`SqlResolver`], which hands out table aliases and
//! column references, and it builds the [`DomainResult`]s describing how each
//! select-list item is read back from a row.
//!
//! Joins are keyed by navigable path: a path reached twice (select list and
//! WHERE, say) shares a single join.

mod errors;
mod expression;
mod fetches;
mod mutation;
mod resolver;
mod select;
mod walker;

pub use errors::LoweringError;
pub use resolver::{ColumnDescriptor, SqlResolver};

use log::debug;

use crate::domain_model::DomainModel;
use crate::query_model::ObjectStatement;
use crate::results::DomainResult;
use crate::sql_ast::SqlStatement;
use walker::QueryConverter;

pub const DEFAULT_MAX_FETCH_DEPTH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoweringOptions {
    /// Deepest navigable path (segments below the root) that may be fetched.
    pub max_fetch_depth: usize,
}

impl Default for LoweringOptions {
    fn default() -> Self {
        LoweringOptions {
            max_fetch_depth: DEFAULT_MAX_FETCH_DEPTH,
        }
    }
}

/// A lowered SELECT with the descriptors needed to read its rows.
#[derive(Debug, Clone)]
pub struct LoweredSelect {
    pub statement: SqlStatement,
    pub results: Vec<DomainResult>,
    pub distinct: bool,
    /// A collection is join-fetched, so owners repeat across rows.
    pub collection_fetched: bool,
}

#[derive(Debug, Clone)]
pub enum LoweredStatement {
    Select(LoweredSelect),
    Mutation(SqlStatement),
}

impl LoweredStatement {
    pub fn statement(&self) -> &SqlStatement {
        match self {
            LoweredStatement::Select(select) => &select.statement,
            LoweredStatement::Mutation(statement) => statement,
        }
    }
}

pub fn lower_statement(
    model: &DomainModel,
    options: &LoweringOptions,
    statement: &ObjectStatement,
) -> Result<LoweredStatement, LoweringError> {
    let mutation = !statement.is_select();
    let converter = QueryConverter::new(model, options.max_fetch_depth, mutation);
    let lowered = match statement {
        ObjectStatement::Select(query) => LoweredStatement::Select(converter.convert_select(query)?),
        ObjectStatement::Update(query) => LoweredStatement::Mutation(converter.convert_update(query)?),
        ObjectStatement::Delete(query) => LoweredStatement::Mutation(converter.convert_delete(query)?),
        ObjectStatement::Insert(query) => LoweredStatement::Mutation(converter.convert_insert(query)?),
    };
    debug!("Lowered statement: {:?}", lowered.statement());
    Ok(lowered)
}
