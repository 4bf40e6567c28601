use super::errors::LoweringError;
use super::expression::scalar_mapping;
use super::walker::{PathTarget, QueryConverter};
use super::LoweredSelect;
use crate::query_model::{Expression, SelectQuery, Selection};
use crate::results::{BasicAssembler, DomainResult, ScalarResult};
use crate::sql_ast::{
    OrderByItem, OrderByOrder, SelectItems, SelectStatement, SqlExpr, SqlStatement,
};

impl QueryConverter<'_> {
    /// FROM and joins first so aliases exist, then the select list, then the
    /// remaining clauses.
    pub(super) fn convert_select(mut self, query: &SelectQuery) -> Result<LoweredSelect, LoweringError> {
        self.register_root(&query.from)?;
        for join in &query.joins {
            self.add_explicit_join(join)?;
        }

        let implicit_root;
        let selections: &[Selection] = if query.selections.is_empty() {
            implicit_root = [Selection {
                expression: Expression::path([query.from.alias.as_str()]),
                alias: None,
            }];
            &implicit_root
        } else {
            &query.selections
        };

        let mut results = Vec::with_capacity(selections.len());
        for (index, selection) in selections.iter().enumerate() {
            results.push(self.select_result(index, selection)?);
        }

        let restriction = match &query.restriction {
            Some(restriction) => Some(self.lower_expression(restriction)?),
            None => None,
        };
        let group_by = query
            .group_by
            .iter()
            .map(|e| self.lower_expression(e))
            .collect::<Result<Vec<_>, _>>()?;
        let having = match &query.having {
            Some(having) => Some(self.lower_expression(having)?),
            None => None,
        };
        let mut order_by = Vec::with_capacity(query.order_by.len());
        for item in &query.order_by {
            order_by.push(OrderByItem {
                expression: self.lower_expression(&item.expression)?,
                order: if item.descending {
                    OrderByOrder::Desc
                } else {
                    OrderByOrder::Asc
                },
            });
        }

        self.check_fetches()?;

        let filters = match (restriction, self.root_restriction.take()) {
            (Some(r), Some(t)) => Some(SqlExpr::and_with(Some(r), t)),
            (r, t) => r.or(t),
        };
        let from = self
            .from
            .take()
            .ok_or_else(|| LoweringError::unsupported(&query.from.entity, "missing FROM"))?;
        let statement = SelectStatement {
            select: SelectItems {
                items: std::mem::take(&mut self.select_items),
                distinct: query.distinct,
            },
            from,
            filters,
            group_by,
            having,
            order_by,
            limit: query.limit,
            offset: query.offset,
        };

        Ok(LoweredSelect {
            statement: SqlStatement::Select(statement),
            results,
            distinct: query.distinct,
            collection_fetched: self.collection_fetched,
        })
    }

    fn select_result(&mut self, index: usize, selection: &Selection) -> Result<DomainResult, LoweringError> {
        let label = selection_label(index, selection);
        if let Expression::Path(path) = &selection.expression {
            match self.resolve_path(path, true)? {
                PathTarget::Entity(navigable) => {
                    return Ok(DomainResult::Entity(self.entity_result(&navigable, &label)?));
                }
                PathTarget::Column(column) | PathTarget::ForeignKey { column, .. } => {
                    let mapping = column.mapping;
                    let position = self.select_column(column);
                    return Ok(DomainResult::Scalar(ScalarResult {
                        label,
                        assembler: BasicAssembler::new(position, Some(mapping)),
                    }));
                }
            }
        }
        let expression = self.lower_expression(&selection.expression)?;
        let mapping = scalar_mapping(&expression);
        let position = self.select_expression(expression);
        Ok(DomainResult::Scalar(ScalarResult {
            label,
            assembler: BasicAssembler::new(position, mapping),
        }))
    }

    fn check_fetches(&self) -> Result<(), LoweringError> {
        for path in &self.explicit_fetches {
            if !self.consumed_fetches.contains(path) {
                return Err(LoweringError::FetchOwnerNotSelected {
                    path: path.full_path().to_string(),
                });
            }
        }
        if self.fetched_bags.len() > 1 {
            return Err(LoweringError::MultipleBagFetch {
                paths: self.fetched_bags.iter().cloned().collect(),
            });
        }
        Ok(())
    }
}

fn selection_label(index: usize, selection: &Selection) -> String {
    if let Some(alias) = &selection.alias {
        return alias.clone();
    }
    match &selection.expression {
        Expression::Path(path) => path.to_string(),
        Expression::CountStar => "count".to_string(),
        Expression::Function { name, .. } => name.clone(),
        _ => format!("col_{}", index),
    }
}
