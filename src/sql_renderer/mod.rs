//! Statement tree to parameterized SQL text.
//!
//! Rendering is a pure function of the tree: the same tree always yields the
//! same text, which is what lets prepared statements be cached by shape.
//! Parameters are rendered as `?` and their bind descriptors are collected in
//! emission order, so the n-th placeholder binds the n-th descriptor.
//!
//! SELECT columns are qualified with their table alias. UPDATE, DELETE and
//! INSERT address a single unaliased table and render bare column names.

mod errors;

pub use errors::RenderError;

use std::fmt::Write;

use crate::sql_ast::{
    ColumnReference, DeleteStatement, FromClause, InsertStatement, JoinType, OrderByOrder,
    ParameterBinding, SelectStatement, SqlExpr, SqlStatement, UpdateStatement,
};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedStatement {
    pub sql: String,
    pub bindings: Vec<ParameterBinding>,
}

pub fn render(statement: &SqlStatement) -> Result<RenderedStatement, RenderError> {
    if let Some(column) = statement.unresolved_columns().first() {
        return Err(RenderError::UnresolvedColumnReference {
            table_alias: column.table_alias.clone(),
            column: column.column.clone(),
        });
    }

    let mut renderer = StatementRenderer::new(statement.is_select());
    match statement {
        SqlStatement::Select(select) => renderer.select(select)?,
        SqlStatement::Update(update) => renderer.update(update)?,
        SqlStatement::Delete(delete) => renderer.delete(delete)?,
        SqlStatement::Insert(insert) => renderer.insert(insert)?,
    }
    renderer.finish()
}

struct StatementRenderer {
    sql: String,
    bindings: Vec<ParameterBinding>,
    qualify_columns: bool,
}

impl StatementRenderer {
    fn new(qualify_columns: bool) -> Self {
        StatementRenderer {
            sql: String::new(),
            bindings: Vec::new(),
            qualify_columns,
        }
    }

    fn finish(self) -> Result<RenderedStatement, RenderError> {
        let placeholders = count_placeholders(&self.sql);
        if placeholders != self.bindings.len() {
            return Err(RenderError::BindCountMismatch {
                placeholders,
                bindings: self.bindings.len(),
            });
        }
        Ok(RenderedStatement {
            sql: self.sql,
            bindings: self.bindings,
        })
    }

    fn select(&mut self, select: &SelectStatement) -> Result<(), RenderError> {
        if select.select.items.is_empty() {
            return Err(RenderError::EmptySelectList);
        }
        self.sql.push_str("SELECT ");
        if select.select.distinct {
            self.sql.push_str("DISTINCT ");
        }
        for (i, item) in select.select.items.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.expr(&item.expression)?;
        }

        self.from(&select.from)?;

        if let Some(filters) = &select.filters {
            self.sql.push_str(" WHERE ");
            self.expr(filters)?;
        }
        if !select.group_by.is_empty() {
            self.sql.push_str(" GROUP BY ");
            self.list(&select.group_by)?;
        }
        if let Some(having) = &select.having {
            self.sql.push_str(" HAVING ");
            self.expr(having)?;
        }
        if !select.order_by.is_empty() {
            self.sql.push_str(" ORDER BY ");
            for (i, item) in select.order_by.iter().enumerate() {
                if i > 0 {
                    self.sql.push_str(", ");
                }
                self.expr(&item.expression)?;
                self.sql.push_str(match item.order {
                    OrderByOrder::Asc => " ASC",
                    OrderByOrder::Desc => " DESC",
                });
            }
        }
        if let Some(limit) = select.limit {
            let _ = write!(self.sql, " LIMIT {}", limit);
        }
        if let Some(offset) = select.offset {
            let _ = write!(self.sql, " OFFSET {}", offset);
        }
        Ok(())
    }

    fn from(&mut self, from: &FromClause) -> Result<(), RenderError> {
        let _ = write!(
            self.sql,
            " FROM {} AS {}",
            from.root.table_name, from.root.table_alias
        );
        for join in &from.joins {
            let keyword = match join.join_type {
                JoinType::Inner => "INNER JOIN",
                JoinType::Left => "LEFT JOIN",
            };
            let _ = write!(
                self.sql,
                " {} {} AS {} ON ",
                keyword, join.table.table_name, join.table.table_alias
            );
            self.expr(&join.joining_on)?;
        }
        Ok(())
    }

    fn update(&mut self, update: &UpdateStatement) -> Result<(), RenderError> {
        if update.assignments.is_empty() {
            return Err(RenderError::EmptyAssignments);
        }
        let _ = write!(self.sql, "UPDATE {} SET ", update.table.table_name);
        for (i, assignment) in update.assignments.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.column(&assignment.column);
            self.sql.push_str(" = ");
            self.expr(&assignment.value)?;
        }
        if let Some(filters) = &update.filters {
            self.sql.push_str(" WHERE ");
            self.expr(filters)?;
        }
        Ok(())
    }

    fn delete(&mut self, delete: &DeleteStatement) -> Result<(), RenderError> {
        let _ = write!(self.sql, "DELETE FROM {}", delete.table.table_name);
        if let Some(filters) = &delete.filters {
            self.sql.push_str(" WHERE ");
            self.expr(filters)?;
        }
        Ok(())
    }

    fn insert(&mut self, insert: &InsertStatement) -> Result<(), RenderError> {
        let _ = write!(self.sql, "INSERT INTO {} (", insert.table.table_name);
        for (i, column) in insert.columns.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.column(column);
        }
        self.sql.push_str(") VALUES ");
        for (row_index, row) in insert.rows.iter().enumerate() {
            if row.len() != insert.columns.len() {
                return Err(RenderError::InsertRowWidth {
                    row: row_index + 1,
                    expected: insert.columns.len(),
                    found: row.len(),
                });
            }
            if row_index > 0 {
                self.sql.push_str(", ");
            }
            self.sql.push('(');
            self.list(row)?;
            self.sql.push(')');
        }
        Ok(())
    }

    fn list(&mut self, exprs: &[SqlExpr]) -> Result<(), RenderError> {
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.expr(expr)?;
        }
        Ok(())
    }

    fn column(&mut self, column: &ColumnReference) {
        if self.qualify_columns {
            let _ = write!(self.sql, "{}.{}", column.table_alias, column.column);
        } else {
            self.sql.push_str(&column.column);
        }
    }

    fn expr(&mut self, expr: &SqlExpr) -> Result<(), RenderError> {
        match expr {
            SqlExpr::Column(column) => self.column(column),
            SqlExpr::Literal(value) => self.literal(value),
            SqlExpr::Parameter(binding) => {
                self.sql.push('?');
                self.bindings.push(binding.clone());
            }
            SqlExpr::Binary {
                operator,
                left,
                right,
            } => {
                self.operand(left)?;
                let _ = write!(self.sql, " {} ", operator.symbol());
                self.operand(right)?;
            }
            SqlExpr::And(items) => self.junction(items, " AND ", "TRUE")?,
            SqlExpr::Or(items) => self.junction(items, " OR ", "FALSE")?,
            SqlExpr::Not(inner) => {
                self.sql.push_str("NOT (");
                self.expr(inner)?;
                self.sql.push(')');
            }
            SqlExpr::IsNull { operand, negated } => {
                self.operand(operand)?;
                self.sql
                    .push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            SqlExpr::InList {
                operand,
                list,
                negated,
            } => {
                if list.is_empty() {
                    return Err(RenderError::EmptyInList);
                }
                self.operand(operand)?;
                self.sql
                    .push_str(if *negated { " NOT IN (" } else { " IN (" });
                self.list(list)?;
                self.sql.push(')');
            }
            SqlExpr::Like {
                operand,
                pattern,
                negated,
            } => {
                self.operand(operand)?;
                self.sql
                    .push_str(if *negated { " NOT LIKE " } else { " LIKE " });
                self.operand(pattern)?;
            }
            SqlExpr::Between {
                operand,
                low,
                high,
                negated,
            } => {
                self.operand(operand)?;
                self.sql
                    .push_str(if *negated { " NOT BETWEEN " } else { " BETWEEN " });
                self.operand(low)?;
                self.sql.push_str(" AND ");
                self.operand(high)?;
            }
            SqlExpr::Function {
                name,
                arguments,
                distinct,
            } => {
                self.sql.push_str(name);
                self.sql.push('(');
                if *distinct {
                    self.sql.push_str("DISTINCT ");
                }
                self.list(arguments)?;
                self.sql.push(')');
            }
            SqlExpr::CountStar => self.sql.push_str("count(*)"),
        }
        Ok(())
    }

    /// Operand of an operator; composite expressions are parenthesized.
    fn operand(&mut self, expr: &SqlExpr) -> Result<(), RenderError> {
        if is_composite(expr) {
            self.sql.push('(');
            self.expr(expr)?;
            self.sql.push(')');
            Ok(())
        } else {
            self.expr(expr)
        }
    }

    fn junction(&mut self, items: &[SqlExpr], separator: &str, empty: &str) -> Result<(), RenderError> {
        match items {
            [] => self.sql.push_str(empty),
            [single] => self.expr(single)?,
            _ => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.sql.push_str(separator);
                    }
                    if matches!(item, SqlExpr::And(_) | SqlExpr::Or(_)) {
                        self.sql.push('(');
                        self.expr(item)?;
                        self.sql.push(')');
                    } else {
                        self.expr(item)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn literal(&mut self, value: &Value) {
        match value {
            Value::Null => self.sql.push_str("NULL"),
            Value::Bool(true) => self.sql.push_str("TRUE"),
            Value::Bool(false) => self.sql.push_str("FALSE"),
            Value::Int(i) => {
                let _ = write!(self.sql, "{}", i);
            }
            Value::UInt(u) => {
                let _ = write!(self.sql, "{}", u);
            }
            Value::Float(f) => {
                let _ = write!(self.sql, "{:?}", f);
            }
            Value::Text(_) | Value::Timestamp(_) | Value::Uuid(_) => {
                let _ = write!(self.sql, "'{}'", value.to_string().replace('\'', "''"));
            }
        }
    }
}

fn is_composite(expr: &SqlExpr) -> bool {
    !matches!(
        expr,
        SqlExpr::Column(_)
            | SqlExpr::Literal(_)
            | SqlExpr::Parameter(_)
            | SqlExpr::Function { .. }
            | SqlExpr::CountStar
    )
}

/// `?` characters outside quoted literals.
fn count_placeholders(sql: &str) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for c in sql.chars() {
        match c {
            '\'' => in_quotes = !in_quotes,
            '?' if !in_quotes => count += 1,
            _ => {}
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::{lower_statement, LoweredStatement, LoweringOptions};
    use crate::domain_model::testing::shop_model;
    use crate::domain_model::value_mapping::INT64;
    use crate::query_parser::parse_statement;
    use crate::sql_ast::{FromClause, Operator, ParameterSource, SelectItem, TableReference};

    fn render_query(query: &str) -> RenderedStatement {
        let model = shop_model();
        let statement = parse_statement(query).unwrap();
        let lowered = lower_statement(&model, &LoweringOptions::default(), &statement).unwrap();
        let statement = match lowered {
            LoweredStatement::Select(select) => select.statement,
            LoweredStatement::Mutation(statement) => statement,
        };
        render(&statement).unwrap()
    }

    #[test]
    fn test_render_select_with_join_and_parameter() {
        let rendered = render_query("select o from Order o where o.customer.name = :name");
        assert_eq!(
            rendered.sql,
            "SELECT orders_1.id, orders_1.version, orders_1.total, orders_1.placed_at, orders_1.customer_id \
             FROM orders AS orders_1 \
             INNER JOIN customers AS customers_1 ON orders_1.customer_id = customers_1.cust_id \
             WHERE customers_1.full_name = ?"
        );
        assert_eq!(rendered.bindings.len(), 1);
        assert_eq!(
            rendered.bindings[0].source,
            ParameterSource::Named("name".to_string())
        );
        assert!(rendered.bindings[0].mapping.is_some());
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let query = "select o, c from Order o join o.customer c left join fetch o.lineItems li \
                     where o.total > 10 and (c.name like 'A%' or c.name is null) order by o.placedAt desc limit 5";
        let first = render_query(query);
        let second = render_query(query);
        assert_eq!(first, second);
        assert!(first.sql.ends_with(" ORDER BY orders_1.placed_at DESC LIMIT 5"));
        assert!(first
            .sql
            .contains("WHERE orders_1.total > 10 AND (customers_1.full_name LIKE ? OR customers_1.full_name IS NULL)"));
    }

    #[test]
    fn test_placeholders_follow_emission_order() {
        let rendered = render_query(
            "select o.id from Order o where o.total between ?1 and ?2 and o.customer.id in (:a, :b)",
        );
        let sources: Vec<_> = rendered.bindings.iter().map(|b| b.source.to_string()).collect();
        assert_eq!(sources, vec!["?1", "?2", ":a", ":b"]);
        assert_eq!(rendered.sql.matches('?').count(), 4);
    }

    #[test]
    fn test_render_subtype_restriction_binds_discriminator() {
        let rendered = render_query("select d.name from Dog d");
        assert_eq!(
            rendered.sql,
            "SELECT animals_1.name FROM animals AS animals_1 WHERE animals_1.kind IN (?)"
        );
        assert_eq!(
            rendered.bindings[0].source,
            ParameterSource::Literal(Value::Text("dog".to_string()))
        );
    }

    #[test]
    fn test_render_aggregates() {
        let rendered = render_query(
            "select o.customer.id, count(distinct o.id), sum(o.total) from Order o group by o.customer.id having count(*) > 1",
        );
        assert_eq!(
            rendered.sql,
            "SELECT orders_1.customer_id, count(DISTINCT orders_1.id), sum(orders_1.total) \
             FROM orders AS orders_1 GROUP BY orders_1.customer_id HAVING count(*) > 1"
        );
    }

    #[test]
    fn test_render_mutations_unqualified() {
        let update = render_query("update Order o set o.total = o.total * 2 where o.id = :id");
        assert_eq!(update.sql, "UPDATE orders SET total = total * 2 WHERE id = ?");

        let delete = render_query("delete from Note n where n.body is null");
        assert_eq!(delete.sql, "DELETE FROM notes WHERE body IS NULL");

        let insert = render_query("insert into Tag (id, label) values (1, 'new'), (2, :label)");
        assert_eq!(insert.sql, "INSERT INTO tags (id, label) VALUES (1, ?), (2, ?)");
        assert_eq!(insert.bindings.len(), 2);
    }

    #[test]
    fn test_not_and_nested_arithmetic() {
        let rendered = render_query("select o.id from Order o where not (o.total - 1) * 2 >= 4");
        assert!(rendered
            .sql
            .ends_with("WHERE NOT (((orders_1.total - 1) * 2) >= 4)"));
    }

    #[test]
    fn test_unresolved_column_is_an_error() {
        let mut statement = SelectStatement::new(FromClause::new(TableReference {
            table_name: "orders".to_string(),
            table_alias: "orders_1".to_string(),
        }));
        statement.select.items.push(SelectItem {
            expression: SqlExpr::Column(ColumnReference::new("customers_9", "id", INT64)),
        });
        let err = render(&SqlStatement::Select(statement)).unwrap_err();
        assert_eq!(
            err,
            RenderError::UnresolvedColumnReference {
                table_alias: "customers_9".to_string(),
                column: "id".to_string()
            }
        );
    }

    #[test]
    fn test_question_mark_inside_literal_is_not_a_placeholder() {
        let mut statement = SelectStatement::new(FromClause::new(TableReference {
            table_name: "notes".to_string(),
            table_alias: "notes_1".to_string(),
        }));
        statement.select.items.push(SelectItem {
            expression: SqlExpr::Binary {
                operator: Operator::Equal,
                left: Box::new(SqlExpr::Column(ColumnReference::new("notes_1", "id", INT64))),
                right: Box::new(SqlExpr::Literal(Value::Text("why?".to_string()))),
            },
        });
        let rendered = render(&SqlStatement::Select(statement)).unwrap();
        assert_eq!(rendered.sql, "SELECT notes_1.id = 'why?' FROM notes AS notes_1");
        assert!(rendered.bindings.is_empty());
    }
}
