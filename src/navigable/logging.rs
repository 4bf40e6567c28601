//! Diagnostic formatting for navigables.
//!
//! Format: `<collapsed-path>#<key>` where the key renders as `<null>` when it
//! has not been read yet, and an absent navigable renders as `<unreferenced>`.
//! Log-based tests depend on this exact output.

use super::{NavigablePath, NavigableRole};
use crate::value::Value;

pub const UNREFERENCED: &str = "<unreferenced>";
pub const NULL_KEY: &str = "<null>";

/// Anything with a dotted full path that can appear in diagnostics.
pub trait Loggable {
    fn loggable_path(&self) -> &str;
}

impl Loggable for NavigablePath {
    fn loggable_path(&self) -> &str {
        self.full_path()
    }
}

impl Loggable for NavigableRole {
    fn loggable_path(&self) -> &str {
        self.full_path()
    }
}

/// Collapse package-like qualifier segments to their first character.
///
/// Leading lower-case segments followed by a capitalised segment are treated
/// as qualifiers: `com.acme.Order.lineItems` becomes `c.a.Order.lineItems`.
/// Names without a capitalised segment are returned unchanged.
pub fn collapse(name: &str) -> String {
    let segments: Vec<&str> = name.split('.').collect();
    let Some(type_index) = segments
        .iter()
        .position(|s| s.chars().next().is_some_and(|c| c.is_uppercase()))
    else {
        return name.to_string();
    };

    let mut out = String::with_capacity(name.len());
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            out.push('.');
        }
        if i < type_index {
            if let Some(first) = segment.chars().next() {
                out.push(first);
            }
        } else {
            out.push_str(segment);
        }
    }
    out
}

/// Render `navigable` and its (possibly unread) key for diagnostics.
pub fn to_loggable_string<N: Loggable>(navigable: Option<&N>, key: Option<&Value>) -> String {
    let Some(navigable) = navigable else {
        return UNREFERENCED.to_string();
    };
    let key = match key {
        Some(value) if !value.is_null() => value.to_string(),
        _ => NULL_KEY.to_string(),
    };
    format!("{}#{}", collapse(navigable.loggable_path()), key)
}
