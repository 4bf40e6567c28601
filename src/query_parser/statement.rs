use nom::{
    branch::alt,
    character::complete::digit1,
    combinator::{cut, map, opt},
    error::context,
    multi::{many0, separated_list1},
    sequence::{delimited, preceded},
    Parser,
};

use super::common::{
    alias_clause, comma, identifier, keyword, name, path_expression, sym, ws, PResult,
};
use super::errors::ParseTrace;
use super::expression::parse_expression;
use crate::query_model::{
    Assignment, DeleteQuery, Expression, FromSpec, InsertQuery, JoinKind, JoinSpec,
    ObjectStatement, SelectQuery, Selection, SortItem, UpdateQuery,
};

pub fn parse_object_statement(input: &str) -> PResult<'_, ObjectStatement> {
    let (input, statement) = alt((
        map(parse_update, ObjectStatement::Update),
        map(parse_delete, ObjectStatement::Delete),
        map(parse_insert, ObjectStatement::Insert),
        map(parse_select, ObjectStatement::Select),
    ))
    .parse(input)?;
    let (input, _) = opt(sym(';')).parse(input)?;
    Ok((input, statement))
}

fn from_spec(input: &str) -> PResult<'_, FromSpec> {
    let (input, entity) = context("expected an entity name", cut(ws(name))).parse(input)?;
    let (input, alias) = alias_clause(input)?;
    let Some(alias) = alias else {
        return Err(nom::Err::Failure(ParseTrace::new(
            input,
            "expected an identification variable after the entity name",
        )));
    };
    Ok((
        input,
        FromSpec {
            entity: entity.to_string(),
            alias: alias.to_string(),
        },
    ))
}

fn parse_select(input: &str) -> PResult<'_, SelectQuery> {
    let (input, select) = opt(preceded(
        keyword("SELECT"),
        (
            opt(keyword("DISTINCT")),
            context(
                "invalid select list",
                cut(separated_list1(comma, parse_selection)),
            ),
        ),
    ))
    .parse(input)?;
    let (distinct, selections) = match select {
        Some((distinct, selections)) => (distinct.is_some(), selections),
        None => (false, Vec::new()),
    };

    let (input, _) = keyword("FROM").parse(input)?;
    let (input, from) = from_spec(input)?;
    let (input, joins) = many0(parse_join).parse(input)?;
    let (input, restriction) = opt(parse_where).parse(input)?;
    let (input, group_by) = opt(preceded(
        (keyword("GROUP"), keyword("BY")),
        context(
            "invalid GROUP BY list",
            cut(separated_list1(comma, parse_expression)),
        ),
    ))
    .parse(input)?;
    let (input, having) = opt(preceded(
        keyword("HAVING"),
        context("invalid HAVING condition", cut(parse_expression)),
    ))
    .parse(input)?;
    let (input, order_by) = opt(preceded(
        (keyword("ORDER"), keyword("BY")),
        context(
            "invalid ORDER BY list",
            cut(separated_list1(comma, parse_sort_item)),
        ),
    ))
    .parse(input)?;
    let (input, limit) = opt(preceded(keyword("LIMIT"), cut(ws(unsigned)))).parse(input)?;
    let (input, offset) = opt(preceded(keyword("OFFSET"), cut(ws(unsigned)))).parse(input)?;

    Ok((
        input,
        SelectQuery {
            distinct,
            selections,
            from,
            joins,
            restriction,
            group_by: group_by.unwrap_or_default(),
            having,
            order_by: order_by.unwrap_or_default(),
            limit,
            offset,
        },
    ))
}

fn parse_selection(input: &str) -> PResult<'_, Selection> {
    let (input, expression) = parse_expression(input)?;
    let (input, alias) = opt(preceded(keyword("AS"), cut(ws(identifier)))).parse(input)?;
    Ok((
        input,
        Selection {
            expression,
            alias: alias.map(str::to_string),
        },
    ))
}

fn parse_join(input: &str) -> PResult<'_, JoinSpec> {
    let (input, kind) = opt(alt((
        map(keyword("INNER"), |_| JoinKind::Inner),
        map((keyword("LEFT"), opt(keyword("OUTER"))), |_| JoinKind::Left),
    )))
    .parse(input)?;
    let (input, _) = keyword("JOIN").parse(input)?;
    let (input, fetch) = opt(keyword("FETCH")).parse(input)?;
    let (input, path) = context(
        "expected an association path after JOIN",
        cut(ws(path_expression)),
    )
    .parse(input)?;
    if path.segments.len() < 2 {
        return Err(nom::Err::Failure(ParseTrace::new(
            input,
            "join path must start with an identification variable",
        )));
    }
    let (input, alias) = alias_clause(input)?;
    Ok((
        input,
        JoinSpec {
            path,
            alias: alias.map(str::to_string),
            kind: kind.unwrap_or(JoinKind::Inner),
            fetch: fetch.is_some(),
        },
    ))
}

fn parse_where(input: &str) -> PResult<'_, Expression> {
    preceded(
        keyword("WHERE"),
        context("invalid WHERE condition", cut(parse_expression)),
    )
    .parse(input)
}

fn parse_sort_item(input: &str) -> PResult<'_, SortItem> {
    let (input, expression) = parse_expression(input)?;
    let (input, direction) = opt(alt((
        map(keyword("ASC"), |_| false),
        map(keyword("DESC"), |_| true),
    )))
    .parse(input)?;
    Ok((
        input,
        SortItem {
            expression,
            descending: direction.unwrap_or(false),
        },
    ))
}

fn unsigned(input: &str) -> PResult<'_, u64> {
    let parsed: PResult<'_, &str> = digit1(input);
    let (rest, digits) = parsed?;
    let value = digits
        .parse::<u64>()
        .map_err(|_| nom::Err::Failure(ParseTrace::new(input, "number out of range")))?;
    Ok((rest, value))
}

fn parse_update(input: &str) -> PResult<'_, UpdateQuery> {
    let (input, _) = keyword("UPDATE").parse(input)?;
    let (input, target) = from_spec(input)?;
    let (input, _) = context("expected SET", cut(keyword("SET"))).parse(input)?;
    let (input, assignments) = context(
        "invalid SET list",
        cut(separated_list1(comma, parse_assignment)),
    )
    .parse(input)?;
    let (input, restriction) = opt(parse_where).parse(input)?;
    Ok((
        input,
        UpdateQuery {
            target,
            assignments,
            restriction,
        },
    ))
}

fn parse_assignment(input: &str) -> PResult<'_, Assignment> {
    let (input, target) = ws(path_expression).parse(input)?;
    let (input, _) = sym('=').parse(input)?;
    let (input, value) = cut(parse_expression).parse(input)?;
    Ok((input, Assignment { target, value }))
}

fn parse_delete(input: &str) -> PResult<'_, DeleteQuery> {
    let (input, _) = keyword("DELETE").parse(input)?;
    let (input, _) = context("expected FROM", cut(keyword("FROM"))).parse(input)?;
    let (input, target) = from_spec(input)?;
    let (input, restriction) = opt(parse_where).parse(input)?;
    Ok((input, DeleteQuery { target, restriction }))
}

fn parse_insert(input: &str) -> PResult<'_, InsertQuery> {
    let (input, _) = keyword("INSERT").parse(input)?;
    let (input, _) = context("expected INTO", cut(keyword("INTO"))).parse(input)?;
    let (input, entity) = context("expected an entity name", cut(ws(name))).parse(input)?;
    let (input, attributes) = context(
        "expected a parenthesized attribute list",
        cut(delimited(
            sym('('),
            separated_list1(comma, ws(name)),
            sym(')'),
        )),
    )
    .parse(input)?;
    let (input, _) = context("expected VALUES", cut(keyword("VALUES"))).parse(input)?;
    let (input, rows) = context(
        "invalid VALUES list",
        cut(separated_list1(
            comma,
            delimited(sym('('), separated_list1(comma, parse_expression), sym(')')),
        )),
    )
    .parse(input)?;
    Ok((
        input,
        InsertQuery {
            entity: entity.to_string(),
            attributes: attributes.into_iter().map(str::to_string).collect(),
            rows,
        },
    ))
}
