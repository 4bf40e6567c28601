//! Parser for the textual object query language.
//!
//! ```text
//! [SELECT [DISTINCT] item [AS name], ...] FROM Entity [AS] alias
//!   { [INNER | LEFT [OUTER]] JOIN [FETCH] alias.path [AS] alias }
//!   [WHERE expr] [GROUP BY expr, ...] [HAVING expr]
//!   [ORDER BY expr [ASC|DESC], ...] [LIMIT n] [OFFSET n]
//! UPDATE Entity [AS] alias SET alias.attr = expr, ... [WHERE expr]
//! DELETE FROM Entity [AS] alias [WHERE expr]
//! INSERT INTO Entity (attr, ...) VALUES (expr, ...), ...
//! ```
//!
//! Keywords are case-insensitive. A query without a SELECT clause selects its
//! root alias.

use nom::character::complete::multispace0;
use nom::Parser;

mod common;
pub mod errors;
mod expression;
mod statement;

pub use errors::QueryParseError;

use crate::query_model::ObjectStatement;

/// Parse a complete statement; trailing input is an error.
pub fn parse_statement(query: &str) -> Result<ObjectStatement, QueryParseError> {
    let parsed = (multispace0, statement::parse_object_statement)
        .map(|(_, statement)| statement)
        .parse(query);
    match parsed {
        Ok((remainder, statement)) => {
            if remainder.trim().is_empty() {
                Ok(statement)
            } else {
                Err(QueryParseError::at(
                    query,
                    remainder,
                    "unexpected tokens after statement",
                ))
            }
        }
        Err(nom::Err::Error(trace)) | Err(nom::Err::Failure(trace)) => {
            Err(QueryParseError::from_trace(query, &trace))
        }
        Err(nom::Err::Incomplete(_)) => Err(QueryParseError::at(
            query,
            "",
            "incomplete input",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_model::{
        BinaryOperator, Expression, JoinKind, Literal, ParameterRef, PathExpression,
    };

    #[test]
    fn test_parse_select_with_fetch_joins() {
        let statement = parse_statement(
            "select o from Order o join fetch o.customer c left join o.lineItems li \
             where c.name like :n order by o.id desc limit 10 offset 5",
        )
        .unwrap();
        let ObjectStatement::Select(query) = statement else {
            panic!("expected select");
        };
        assert_eq!(query.from.entity, "Order");
        assert_eq!(query.from.alias, "o");
        assert_eq!(query.selections.len(), 1);
        assert_eq!(query.joins.len(), 2);
        assert!(query.joins[0].fetch);
        assert_eq!(query.joins[0].kind, JoinKind::Inner);
        assert_eq!(query.joins[0].alias.as_deref(), Some("c"));
        assert_eq!(query.joins[1].kind, JoinKind::Left);
        assert!(!query.joins[1].fetch);
        assert_eq!(query.joins[1].path, PathExpression::new(["o", "lineItems"]));
        assert!(query.order_by[0].descending);
        assert_eq!(query.limit, Some(10));
        assert_eq!(query.offset, Some(5));
    }

    #[test]
    fn test_from_only_query_has_empty_select_list() {
        let ObjectStatement::Select(query) = parse_statement("FROM Employee e").unwrap() else {
            panic!("expected select");
        };
        assert!(query.selections.is_empty());
        assert_eq!(query.from.alias, "e");
    }

    #[test]
    fn test_parse_select_aggregates_with_aliases() {
        let ObjectStatement::Select(query) = parse_statement(
            "SELECT c.name AS customer, count(*) AS n FROM Order AS o JOIN o.customer c \
             GROUP BY c.name HAVING count(*) > 1;",
        )
        .unwrap() else {
            panic!("expected select");
        };
        assert_eq!(query.selections[0].alias.as_deref(), Some("customer"));
        assert_eq!(query.selections[1].expression, Expression::CountStar);
        assert_eq!(query.group_by.len(), 1);
        assert!(query.having.is_some());
    }

    #[test]
    fn test_parse_update() {
        let ObjectStatement::Update(update) =
            parse_statement("UPDATE Order o SET o.total = o.total * 2 WHERE o.id = ?1").unwrap()
        else {
            panic!("expected update");
        };
        assert_eq!(update.target.entity, "Order");
        assert_eq!(update.assignments.len(), 1);
        assert_eq!(
            update.restriction,
            Some(Expression::binary(
                BinaryOperator::Equal,
                Expression::path(["o", "id"]),
                Expression::Parameter(ParameterRef::Positional(1)),
            ))
        );
    }

    #[test]
    fn test_parse_delete_and_insert() {
        assert!(matches!(
            parse_statement("delete from Note n where n.body is null").unwrap(),
            ObjectStatement::Delete(_)
        ));
        let ObjectStatement::Insert(insert) =
            parse_statement("INSERT INTO Tag (id, label) VALUES (1, 'new'), (2, :l)").unwrap()
        else {
            panic!("expected insert");
        };
        assert_eq!(insert.attributes, vec!["id", "label"]);
        assert_eq!(insert.rows.len(), 2);
        assert_eq!(
            insert.rows[0][1],
            Expression::Literal(Literal::String("new".into()))
        );
    }

    #[test]
    fn test_trailing_garbage_is_reported_with_offset() {
        let err = parse_statement("FROM Order o garbage here").unwrap_err();
        assert_eq!(err.message, "unexpected tokens after statement");
        assert!(err.remainder.starts_with("garbage"));
    }

    #[test]
    fn test_missing_alias_is_an_error() {
        let err = parse_statement("SELECT o FROM Order WHERE o.id = 1").unwrap_err();
        assert!(err.message.contains("identification variable"));
    }

    #[test]
    fn test_bad_where_clause_is_an_error() {
        let err = parse_statement("FROM Order o WHERE").unwrap_err();
        assert!(err.offset >= "FROM Order o WHERE".len() - 1);
    }
}
