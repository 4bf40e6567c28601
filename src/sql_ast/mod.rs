//! Relational statement tree.
//!
//! Produced by the [`converter`](crate::converter) and consumed by the
//! [`sql_renderer`](crate::sql_renderer). Nodes are closed enums; consumers
//! dispatch with exhaustive matches.
//!
//! Column references carry the alias of the table they belong to. A statement
//! is complete only when every referenced alias is part of its table set;
//! [`SqlStatement::unresolved_columns`] reports the ones that are not.

mod expression;

pub use expression::{
    ColumnReference, Operator, ParameterBinding, ParameterSource, SqlExpr,
};

use std::collections::HashSet;

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct TableReference {
    pub table_name: String,
    pub table_alias: String,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum JoinType {
    Inner,
    Left,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Join {
    pub table: TableReference,
    pub joining_on: SqlExpr,
    pub join_type: JoinType,
}

#[derive(Debug, PartialEq, Clone)]
pub struct FromClause {
    pub root: TableReference,
    pub joins: Vec<Join>,
}

impl FromClause {
    pub fn new(root: TableReference) -> Self {
        FromClause {
            root,
            joins: Vec::new(),
        }
    }

    pub fn table_aliases(&self) -> HashSet<&str> {
        std::iter::once(self.root.table_alias.as_str())
            .chain(self.joins.iter().map(|j| j.table.table_alias.as_str()))
            .collect()
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct SelectItem {
    pub expression: SqlExpr,
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct SelectItems {
    pub items: Vec<SelectItem>,
    pub distinct: bool,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum OrderByOrder {
    Asc,
    Desc,
}

#[derive(Debug, PartialEq, Clone)]
pub struct OrderByItem {
    pub expression: SqlExpr,
    pub order: OrderByOrder,
}

#[derive(Debug, PartialEq, Clone)]
pub struct SelectStatement {
    pub select: SelectItems,
    pub from: FromClause,
    pub filters: Option<SqlExpr>,
    pub group_by: Vec<SqlExpr>,
    pub having: Option<SqlExpr>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl SelectStatement {
    pub fn new(from: FromClause) -> Self {
        SelectStatement {
            select: SelectItems::default(),
            from,
            filters: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Assignment {
    pub column: ColumnReference,
    pub value: SqlExpr,
}

#[derive(Debug, PartialEq, Clone)]
pub struct UpdateStatement {
    pub table: TableReference,
    pub assignments: Vec<Assignment>,
    pub filters: Option<SqlExpr>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct DeleteStatement {
    pub table: TableReference,
    pub filters: Option<SqlExpr>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct InsertStatement {
    pub table: TableReference,
    pub columns: Vec<ColumnReference>,
    pub rows: Vec<Vec<SqlExpr>>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum SqlStatement {
    Select(SelectStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    Insert(InsertStatement),
}

impl SqlStatement {
    pub fn is_select(&self) -> bool {
        matches!(self, SqlStatement::Select(_))
    }

    /// Column references whose table alias is not part of the statement.
    pub fn unresolved_columns<'a>(&'a self) -> Vec<&'a ColumnReference> {
        let mut unresolved = Vec::new();
        match self {
            SqlStatement::Select(select) => {
                let known = select.from.table_aliases();
                let mut check = |column: &'a ColumnReference| {
                    if !known.contains(column.table_alias.as_str()) {
                        unresolved.push(column);
                    }
                };
                let expressions = select
                    .select
                    .items
                    .iter()
                    .map(|item| &item.expression)
                    .chain(select.from.joins.iter().map(|join| &join.joining_on))
                    .chain(select.filters.iter())
                    .chain(select.group_by.iter())
                    .chain(select.having.iter())
                    .chain(select.order_by.iter().map(|item| &item.expression));
                for expr in expressions {
                    expr.for_each_column(&mut check);
                }
            }
            SqlStatement::Update(update) => {
                let alias = update.table.table_alias.as_str();
                for assignment in &update.assignments {
                    if assignment.column.table_alias != alias {
                        unresolved.push(&assignment.column);
                    }
                    assignment.value.for_each_column(&mut |column| {
                        if column.table_alias != alias {
                            unresolved.push(column);
                        }
                    });
                }
                if let Some(filters) = &update.filters {
                    filters.for_each_column(&mut |column| {
                        if column.table_alias != alias {
                            unresolved.push(column);
                        }
                    });
                }
            }
            SqlStatement::Delete(delete) => {
                let alias = delete.table.table_alias.as_str();
                if let Some(filters) = &delete.filters {
                    filters.for_each_column(&mut |column| {
                        if column.table_alias != alias {
                            unresolved.push(column);
                        }
                    });
                }
            }
            SqlStatement::Insert(insert) => {
                let alias = insert.table.table_alias.as_str();
                for column in &insert.columns {
                    if column.table_alias != alias {
                        unresolved.push(column);
                    }
                }
            }
        }
        unresolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_model::value_mapping::INT64;

    fn table(name: &str, alias: &str) -> TableReference {
        TableReference {
            table_name: name.to_string(),
            table_alias: alias.to_string(),
        }
    }

    #[test]
    fn test_unresolved_columns_reports_unknown_aliases() {
        let mut statement = SelectStatement::new(FromClause::new(table("orders", "orders_1")));
        statement.select.items.push(SelectItem {
            expression: SqlExpr::Column(ColumnReference::new("orders_1", "id", INT64)),
        });
        statement.filters = Some(SqlExpr::equals(
            SqlExpr::Column(ColumnReference::new("customers_1", "cust_id", INT64)),
            SqlExpr::Literal(crate::value::Value::Int(1)),
        ));
        let statement = SqlStatement::Select(statement);
        let unresolved = statement.unresolved_columns();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].table_alias, "customers_1");
    }

    #[test]
    fn test_and_with_flattens() {
        let a = SqlExpr::Literal(crate::value::Value::Bool(true));
        let combined = SqlExpr::and_with(None, a.clone());
        assert_eq!(combined, a);
        let combined = SqlExpr::and_with(Some(combined), a.clone());
        let combined = SqlExpr::and_with(Some(combined), a);
        assert!(matches!(combined, SqlExpr::And(ref items) if items.len() == 3));
    }
}
