use std::sync::Arc;

use super::errors::LoweringError;
use super::walker::{literal_expr, PathTarget, QueryConverter};
use crate::domain_model::{AssociationJoin, AttributeMapping, ColumnMapping, EntityMapping};
use crate::navigable::NavigablePath;
use crate::query_model::{Assignment, DeleteQuery, InsertQuery, PathExpression, UpdateQuery};
use crate::sql_ast::{
    self, ColumnReference, DeleteStatement, InsertStatement, SqlExpr, SqlStatement,
    UpdateStatement,
};

impl QueryConverter<'_> {
    pub(super) fn convert_update(mut self, query: &UpdateQuery) -> Result<SqlStatement, LoweringError> {
        let root = self.register_root(&query.target)?;
        let table = self.joined_path(&root)?.table.clone();
        let entity = Arc::clone(&self.joined_path(&root)?.entity);

        let mut assignments = Vec::with_capacity(query.assignments.len());
        for assignment in &query.assignments {
            assignments.push(self.assignment(&entity, assignment)?);
        }
        let filters = self.mutation_filters(query.restriction.as_ref())?;
        Ok(SqlStatement::Update(UpdateStatement {
            table,
            assignments,
            filters,
        }))
    }

    fn assignment(
        &mut self,
        entity: &EntityMapping,
        assignment: &Assignment,
    ) -> Result<sql_ast::Assignment, LoweringError> {
        let target = &assignment.target;
        let invalid = || LoweringError::InvalidAssignment {
            path: target.to_string(),
        };
        if target.tail() == [entity.identifier_name.as_str()] {
            return Err(invalid());
        }
        let column = match self.resolve_path(target, false)? {
            PathTarget::Column(column) => column,
            PathTarget::ForeignKey { column, .. } => column,
            PathTarget::Entity(_) => return Err(invalid()),
        };
        let mut value = self.lower_expression(&assignment.value)?;
        value.infer_parameter_mapping(Some(column.mapping));
        Ok(sql_ast::Assignment { column, value })
    }

    pub(super) fn convert_delete(mut self, query: &DeleteQuery) -> Result<SqlStatement, LoweringError> {
        let root = self.register_root(&query.target)?;
        let table = self.joined_path(&root)?.table.clone();
        let filters = self.mutation_filters(query.restriction.as_ref())?;
        Ok(SqlStatement::Delete(DeleteStatement { table, filters }))
    }

    fn mutation_filters(
        &mut self,
        restriction: Option<&crate::query_model::Expression>,
    ) -> Result<Option<SqlExpr>, LoweringError> {
        let restriction = match restriction {
            Some(restriction) => Some(self.lower_expression(restriction)?),
            None => None,
        };
        Ok(match (restriction, self.root_restriction.take()) {
            (Some(r), Some(t)) => Some(SqlExpr::and_with(Some(r), t)),
            (r, t) => r.or(t),
        })
    }

    /// INSERT targets identifier, basic and to-one foreign-key columns of the
    /// entity's own table. The discriminator column is always added.
    pub(super) fn convert_insert(mut self, query: &InsertQuery) -> Result<SqlStatement, LoweringError> {
        let entity = Arc::clone(self.model.entity(&query.entity)?);
        let path = NavigablePath::root(entity.name.as_str());
        let table = self.resolver.register_table(&path, &entity.table);

        let mut columns = Vec::with_capacity(query.attributes.len() + 1);
        for attribute in &query.attributes {
            let mapping = insert_column(&entity, attribute)?;
            columns.push(ColumnReference::new(
                table.table_alias.as_str(),
                mapping.column.as_str(),
                mapping.mapping,
            ));
        }
        let discriminator = entity.discriminator.as_ref();
        if let Some(discriminator) = discriminator {
            if columns.iter().any(|c| c.column == discriminator.column.column) {
                return Err(LoweringError::InvalidAssignment {
                    path: format!("{}.{}", entity.name, discriminator.column.column),
                });
            }
            columns.push(ColumnReference::new(
                table.table_alias.as_str(),
                discriminator.column.column.as_str(),
                discriminator.column.mapping,
            ));
        }

        let mut rows = Vec::with_capacity(query.rows.len());
        for (index, row) in query.rows.iter().enumerate() {
            if row.len() != query.attributes.len() {
                return Err(LoweringError::InsertArity {
                    row: index + 1,
                    expected: query.attributes.len(),
                    found: row.len(),
                });
            }
            let mut values = Vec::with_capacity(columns.len());
            for (value, column) in row.iter().zip(&columns) {
                let mut value = self.lower_expression_without_scope(value, &query.entity)?;
                value.infer_parameter_mapping(Some(column.mapping));
                values.push(value);
            }
            if let Some(discriminator) = discriminator {
                values.push(literal_expr(
                    discriminator.value.clone(),
                    Some(discriminator.column.mapping),
                ));
            }
            rows.push(values);
        }

        Ok(SqlStatement::Insert(InsertStatement {
            table,
            columns,
            rows,
        }))
    }

    /// INSERT values have no identification variable in scope.
    fn lower_expression_without_scope(
        &mut self,
        value: &crate::query_model::Expression,
        entity: &str,
    ) -> Result<SqlExpr, LoweringError> {
        if let Some(path) = first_path(value) {
            return Err(LoweringError::unsupported(
                path,
                format!("INSERT INTO {} values cannot reference paths", entity),
            ));
        }
        self.lower_expression(value)
    }
}

fn insert_column<'e>(entity: &'e EntityMapping, attribute: &str) -> Result<&'e ColumnMapping, LoweringError> {
    if attribute == entity.identifier_name {
        return Ok(&entity.identifier);
    }
    let path = format!("{}.{}", entity.name, attribute);
    match entity.attribute(attribute) {
        Some((_, AttributeMapping::Basic(basic))) => Ok(&basic.column),
        Some((_, AttributeMapping::Association(association))) => match &association.join {
            AssociationJoin::ForeignKeyOnOwner { column } => Ok(column),
            _ => Err(LoweringError::InvalidAssignment { path }),
        },
        Some((_, AttributeMapping::Embedded(_))) => Err(LoweringError::InvalidAssignment { path }),
        None => Err(LoweringError::unknown_navigable(&entity.name, attribute, path)),
    }
}

fn first_path(expression: &crate::query_model::Expression) -> Option<&PathExpression> {
    use crate::query_model::Expression;
    match expression {
        Expression::Path(path) => Some(path),
        Expression::Binary { left, right, .. } => first_path(left).or_else(|| first_path(right)),
        Expression::And(items) | Expression::Or(items) => items.iter().find_map(first_path),
        Expression::Not(inner) => first_path(inner),
        Expression::IsNull { operand, .. } => first_path(operand),
        Expression::InList { operand, list, .. } => {
            first_path(operand).or_else(|| list.iter().find_map(first_path))
        }
        Expression::Like {
            operand, pattern, ..
        } => first_path(operand).or_else(|| first_path(pattern)),
        Expression::Between {
            operand, low, high, ..
        } => first_path(operand)
            .or_else(|| first_path(low))
            .or_else(|| first_path(high)),
        Expression::Function { arguments, .. } => arguments.iter().find_map(first_path),
        Expression::Literal(_) | Expression::Parameter(_) | Expression::CountStar => None,
    }
}
