//! Relgraph - object-graph queries over relational stores
//!
//! This crate lowers queries written against a domain model to relational
//! statements and hydrates the rows back into an identity-consistent object
//! graph:
//! - Domain-model definitions over existing tables (YAML)
//! - Object query language parsing
//! - Lowering to a relational statement tree with join reuse and fetch graphs
//! - Deterministic SQL rendering with positional binds
//! - Execution against a store and row-by-row hydration through an identity
//!   registry

pub mod config;
pub mod converter;
pub mod domain_model;
pub mod errors;
pub mod executor;
pub mod identity;
pub mod initializer;
pub mod navigable;
pub mod query_model;
pub mod query_parser;
pub mod results;
pub mod session;
pub mod sql_ast;
pub mod sql_renderer;
pub mod value;

pub use errors::PipelineError;
pub use session::{QueryEngine, QueryResults, Session};
pub use value::Value;
