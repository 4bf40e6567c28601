use std::collections::{HashMap, HashSet};

use log::debug;

use super::errors::LoweringError;
use crate::domain_model::ColumnMapping;
use crate::navigable::NavigablePath;
use crate::sql_ast::{ColumnReference, TableReference};

/// A domain column as the mapping model describes it: which navigable owns
/// the table, which table, which column.
#[derive(Debug, Clone, Copy)]
pub struct ColumnDescriptor<'a> {
    pub path: &'a NavigablePath,
    pub table: &'a str,
    pub column: &'a ColumnMapping,
}

/// Binds domain columns to table aliases for one statement under
/// construction.
///
/// Tables are keyed by (navigable path, table name), so a join table and its
/// target can share a path. Aliases are `<table stem>_<n>` with a counter per
/// stem. Resolving an equal descriptor twice yields equal references.
#[derive(Debug, Default)]
pub struct SqlResolver {
    alias_counters: HashMap<String, usize>,
    tables: HashMap<(NavigablePath, String), TableReference>,
    columns: HashMap<(String, String), ColumnReference>,
    excluded: HashSet<NavigablePath>,
}

impl SqlResolver {
    pub fn new() -> Self {
        SqlResolver::default()
    }

    pub fn table(&self, path: &NavigablePath, table: &str) -> Option<&TableReference> {
        self.tables.get(&(path.clone(), table.to_string()))
    }

    /// Existing table reference for (`path`, `table`), or a fresh one.
    pub fn register_table(&mut self, path: &NavigablePath, table: &str) -> TableReference {
        let key = (path.clone(), table.to_string());
        if let Some(existing) = self.tables.get(&key) {
            return existing.clone();
        }
        let stem = table.rsplit('.').next().unwrap_or(table).to_string();
        let counter = self.alias_counters.entry(stem.clone()).or_insert(0);
        *counter += 1;
        let reference = TableReference {
            table_name: table.to_string(),
            table_alias: format!("{}_{}", stem, counter),
        };
        debug!("Registered table {} as {} for {}", table, reference.table_alias, path);
        self.tables.insert(key, reference.clone());
        reference
    }

    /// Remove `path` (and everything below it) from the statement's scope.
    pub fn exclude(&mut self, path: &NavigablePath) {
        self.excluded.insert(path.clone());
    }

    pub fn is_excluded(&self, path: &NavigablePath) -> bool {
        let mut current = Some(path.clone());
        while let Some(node) = current {
            if self.excluded.contains(&node) {
                return true;
            }
            current = node.parent();
        }
        false
    }

    pub fn resolve(&mut self, descriptor: ColumnDescriptor<'_>) -> Result<ColumnReference, LoweringError> {
        if self.is_excluded(descriptor.path) {
            return Err(LoweringError::ExcludedPath {
                path: descriptor.path.full_path().to_string(),
            });
        }
        let table = self.register_table(descriptor.path, descriptor.table);
        let key = (table.table_alias.clone(), descriptor.column.column.clone());
        let reference = self.columns.entry(key).or_insert_with(|| {
            ColumnReference::new(
                table.table_alias.clone(),
                descriptor.column.column.clone(),
                descriptor.column.mapping,
            )
        });
        Ok(reference.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_model::value_mapping::{INT64, STRING};

    fn column(name: &str) -> ColumnMapping {
        ColumnMapping {
            column: name.to_string(),
            mapping: INT64,
        }
    }

    #[test]
    fn test_aliases_count_per_table_stem() {
        let mut resolver = SqlResolver::new();
        let root = NavigablePath::root("Employee");
        let manager = root.append("manager");
        let a = resolver.register_table(&root, "hr.employees");
        let b = resolver.register_table(&manager, "hr.employees");
        let c = resolver.register_table(&root, "hr.employees");
        assert_eq!(a.table_alias, "employees_1");
        assert_eq!(b.table_alias, "employees_2");
        assert_eq!(a, c);
    }

    #[test]
    fn test_resolving_twice_returns_equal_reference() {
        let mut resolver = SqlResolver::new();
        let root = NavigablePath::root("Order");
        let id = column("id");
        let first = resolver
            .resolve(ColumnDescriptor { path: &root, table: "orders", column: &id })
            .unwrap();
        let second = resolver
            .resolve(ColumnDescriptor { path: &root, table: "orders", column: &id })
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.table_alias, "orders_1");
    }

    #[test]
    fn test_first_mapping_wins_for_a_column() {
        let mut resolver = SqlResolver::new();
        let root = NavigablePath::root("Order");
        let first = resolver
            .resolve(ColumnDescriptor { path: &root, table: "orders", column: &column("x") })
            .unwrap();
        let text = ColumnMapping { column: "x".into(), mapping: STRING };
        let second = resolver
            .resolve(ColumnDescriptor { path: &root, table: "orders", column: &text })
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_excluded_paths_fail_to_resolve() {
        let mut resolver = SqlResolver::new();
        let pruned = NavigablePath::root("Order").append("lineItems");
        resolver.exclude(&pruned);
        let deeper = pruned.append("product");
        assert!(resolver.is_excluded(&deeper));
        let err = resolver
            .resolve(ColumnDescriptor { path: &deeper, table: "products", column: &column("id") })
            .unwrap_err();
        assert_eq!(
            err,
            LoweringError::ExcludedPath { path: "Order.lineItems.product".into() }
        );
    }
}
