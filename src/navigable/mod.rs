//! Canonical naming for positions in the domain graph.
//!
//! Two flavours share the same shape:
//!
//! - [`NavigablePath`] names a position inside one query (`Order.customer`,
//!   `Order.lineItems.product`). Initializers, table groups and resolver scopes
//!   are keyed by it.
//! - [`NavigableRole`] names a position in the mapping model independent of any
//!   query (`Order.lineItems`). Collection keys use it.
//!
//! Both are immutable, cheap to clone (`Arc` parent chain) and compare
//! structurally by their full dotted path.

mod logging;
mod path;

pub use logging::{collapse, to_loggable_string, Loggable, NULL_KEY, UNREFERENCED};
pub use path::{NavigablePath, NavigableRole};
