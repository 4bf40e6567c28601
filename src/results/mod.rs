//! Row readers.
//!
//! [`BasicAssembler`]s pull single typed values out of a row by position.
//! [`DomainResult`]s describe, independently of row layout, what one select
//! item produces: a scalar, or an entity with its identifier, discriminator,
//! version and attribute fetches. The initializer forest is built from them.

mod assembler;
mod domain_result;

pub use assembler::{AssemblyError, BasicAssembler};
pub use domain_result::{DomainResult, EntityResult, Fetch, ScalarResult};
