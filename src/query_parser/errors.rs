use nom::error::{ContextError, ErrorKind, ParseError};
use std::fmt;
use thiserror::Error;

/// nom error type used by every parser in this module: a trail of
/// `(remaining input, context)` pairs, innermost first.
#[derive(Debug, PartialEq)]
pub struct ParseTrace<'a> {
    pub errors: Vec<(&'a str, &'static str)>,
}

impl<'a> ParseTrace<'a> {
    pub fn new(input: &'a str, ctx: &'static str) -> Self {
        ParseTrace {
            errors: vec![(input, ctx)],
        }
    }
}

impl<'a> ParseError<&'a str> for ParseTrace<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        ParseTrace::new(input, "unexpected input")
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<'a> ContextError<&'a str> for ParseTrace<'a> {
    fn add_context(input: &'a str, ctx: &'static str, mut other: Self) -> Self {
        other.errors.push((input, ctx));
        other
    }
}

impl fmt::Display for ParseTrace<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (input, ctx) in &self.errors {
            writeln!(f, "{}: {}", ctx, input)?;
        }
        Ok(())
    }
}

/// Owned parse failure returned to callers of [`parse_statement`](super::parse_statement).
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Failed to parse query at offset {offset}: {message} (near '{remainder}')")]
pub struct QueryParseError {
    pub message: String,
    /// Byte offset into the query text.
    pub offset: usize,
    /// Unparsed input starting at `offset`, shortened for display.
    pub remainder: String,
}

impl QueryParseError {
    pub(super) fn from_trace(query: &str, trace: &ParseTrace<'_>) -> Self {
        // The entry that got furthest into the input is the most useful one;
        // among equals prefer the outermost context, which names the clause.
        let best = trace
            .errors
            .iter()
            .enumerate()
            .min_by_key(|(i, (rest, _))| (rest.len(), usize::MAX - i));
        match best {
            Some((_, (rest, ctx))) => QueryParseError::at(query, rest, ctx),
            None => QueryParseError::at(query, query, "unexpected input"),
        }
    }

    pub(super) fn at(query: &str, rest: &str, message: &str) -> Self {
        let offset = query.len().saturating_sub(rest.len());
        let remainder: String = rest.trim_start().chars().take(40).collect();
        QueryParseError {
            message: message.to_string(),
            offset,
            remainder,
        }
    }
}
