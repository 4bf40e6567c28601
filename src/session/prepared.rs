use std::fmt::Write;

use crate::results::DomainResult;
use crate::sql_ast::ParameterBinding;

#[derive(Debug, Clone)]
pub enum PreparedKind {
    Select {
        results: Vec<DomainResult>,
        /// Collapse duplicate result rows after hydration.
        dedupe: bool,
    },
    Mutation,
}

/// A query parsed, lowered and rendered once, ready to run any number of
/// times with different parameter values.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    pub query: String,
    pub sql: String,
    pub bindings: Vec<ParameterBinding>,
    pub kind: PreparedKind,
}

impl PreparedQuery {
    pub fn is_select(&self) -> bool {
        matches!(self.kind, PreparedKind::Select { .. })
    }

    /// Select-list labels, in order. Empty for mutations.
    pub fn columns(&self) -> Vec<String> {
        match &self.kind {
            PreparedKind::Select { results, .. } => {
                results.iter().map(|r| r.label().to_string()).collect()
            }
            PreparedKind::Mutation => Vec::new(),
        }
    }

    /// SQL text followed by one line per placeholder.
    pub fn explain(&self) -> String {
        let mut out = self.sql.clone();
        for (i, binding) in self.bindings.iter().enumerate() {
            let mapping = binding
                .mapping
                .map(|m| format!("{:?}", m.sql_type))
                .unwrap_or_else(|| "inferred".to_string());
            let _ = write!(out, "\n  {}: {} ({})", i + 1, binding.source, mapping);
        }
        out
    }
}
