use std::collections::HashSet;

use lazy_static::lazy_static;
use nom::{
    bytes::complete::{tag_no_case, take_while},
    character::complete::{char, multispace0, satisfy},
    combinator::{not, recognize},
    error::ParseError,
    multi::many0,
    sequence::{delimited, pair, preceded, terminated},
    IResult, Parser,
};

use super::errors::ParseTrace;
use crate::query_model::PathExpression;

pub type PResult<'a, O> = IResult<&'a str, O, ParseTrace<'a>>;

lazy_static! {
    static ref RESERVED: HashSet<&'static str> = [
        "SELECT", "DISTINCT", "FROM", "AS", "JOIN", "INNER", "LEFT", "OUTER", "FETCH", "WHERE",
        "GROUP", "BY", "HAVING", "ORDER", "ASC", "DESC", "LIMIT", "OFFSET", "AND", "OR", "NOT",
        "IS", "NULL", "IN", "LIKE", "BETWEEN", "TRUE", "FALSE", "UPDATE", "SET", "DELETE",
        "INSERT", "INTO", "VALUES",
    ]
    .into_iter()
    .collect();
}

pub fn ws<'a, O, E: ParseError<&'a str>, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Case-insensitive keyword that is not the prefix of a longer word.
pub fn keyword<'a>(kw: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = ParseTrace<'a>> {
    ws(terminated(tag_no_case(kw), not(satisfy(is_ident_char))))
}

pub fn is_reserved(word: &str) -> bool {
    RESERVED.contains(word.to_ascii_uppercase().as_str())
}

/// A bare word; reserved words are accepted. Used where the grammar position
/// already rules out a keyword (entity names, attributes after a dot).
pub fn name(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(is_ident_char),
    ))
    .parse(input)
}

/// A bare identifier that is not a reserved word.
pub fn identifier(input: &str) -> PResult<'_, &str> {
    let (rest, ident) = name(input)?;
    if is_reserved(ident) {
        return Err(nom::Err::Error(ParseTrace::new(input, "reserved word used as identifier")));
    }
    Ok((rest, ident))
}

/// `alias.attr.attr`, no whitespace around the dots. Only the leading alias
/// has to avoid reserved words.
pub fn path_expression(input: &str) -> PResult<'_, PathExpression> {
    let (rest, (first, others)) = pair(identifier, many0(preceded(char('.'), name))).parse(input)?;
    Ok((
        rest,
        PathExpression::new(std::iter::once(first).chain(others)),
    ))
}

/// Optional `[AS] alias` after an entity name or join path.
pub fn alias_clause(input: &str) -> PResult<'_, Option<&str>> {
    let (input, _) = sym_space(input)?;
    if let Ok((rest, _)) = keyword("AS").parse(input) {
        let (rest, alias) = ws(identifier).parse(rest)?;
        return Ok((rest, Some(alias)));
    }
    match ws(identifier).parse(input) {
        Ok((rest, alias)) => Ok((rest, Some(alias))),
        Err(nom::Err::Error(_)) => Ok((input, None)),
        Err(e) => Err(e),
    }
}

pub fn comma(input: &str) -> PResult<'_, char> {
    sym(',').parse(input)
}

/// A single punctuation character with surrounding whitespace.
pub fn sym<'a>(c: char) -> impl Parser<&'a str, Output = char, Error = ParseTrace<'a>> {
    ws(char(c))
}

fn sym_space(input: &str) -> PResult<'_, &str> {
    multispace0(input)
}
