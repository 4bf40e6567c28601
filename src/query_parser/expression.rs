use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, one_of},
    combinator::{cut, map, opt, recognize},
    error::context,
    multi::separated_list1,
    sequence::{delimited, pair, preceded},
    Parser,
};

use super::common::{comma, identifier, keyword, path_expression, sym, ws, PResult};
use super::errors::ParseTrace;
use crate::query_model::{BinaryOperator, Expression, Literal, ParameterRef};

/// Entry point; `OR` binds loosest.
pub fn parse_expression(input: &str) -> PResult<'_, Expression> {
    parse_or(input)
}

fn parse_or(input: &str) -> PResult<'_, Expression> {
    let (mut input, first) = parse_and(input)?;
    let mut operands = vec![first];
    while let Ok((rest, _)) = keyword("OR").parse(input) {
        let (rest, next) = cut(parse_and).parse(rest)?;
        operands.push(next);
        input = rest;
    }
    Ok((input, flatten(operands, Expression::Or)))
}

fn parse_and(input: &str) -> PResult<'_, Expression> {
    let (mut input, first) = parse_not(input)?;
    let mut operands = vec![first];
    while let Ok((rest, _)) = keyword("AND").parse(input) {
        let (rest, next) = cut(parse_not).parse(rest)?;
        operands.push(next);
        input = rest;
    }
    Ok((input, flatten(operands, Expression::And)))
}

fn flatten(mut operands: Vec<Expression>, wrap: fn(Vec<Expression>) -> Expression) -> Expression {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        wrap(operands)
    }
}

fn parse_not(input: &str) -> PResult<'_, Expression> {
    if let Ok((rest, _)) = keyword("NOT").parse(input) {
        let (rest, inner) = cut(parse_not).parse(rest)?;
        return Ok((rest, Expression::Not(Box::new(inner))));
    }
    parse_comparison(input)
}

fn comparison_operator(input: &str) -> PResult<'_, BinaryOperator> {
    ws(alt((
        map(tag("<="), |_| BinaryOperator::LessThanEqual),
        map(tag(">="), |_| BinaryOperator::GreaterThanEqual),
        map(tag("<>"), |_| BinaryOperator::NotEqual),
        map(tag("!="), |_| BinaryOperator::NotEqual),
        map(tag("="), |_| BinaryOperator::Equal),
        map(tag("<"), |_| BinaryOperator::LessThan),
        map(tag(">"), |_| BinaryOperator::GreaterThan),
    )))
    .parse(input)
}

fn parenthesized_list(input: &str) -> PResult<'_, Vec<Expression>> {
    delimited(sym('('), separated_list1(comma, parse_expression), sym(')')).parse(input)
}

fn parse_comparison(input: &str) -> PResult<'_, Expression> {
    let (input, left) = parse_additive(input)?;

    if let Ok((rest, negated)) = (keyword("IS"), opt(keyword("NOT")), keyword("NULL"))
        .map(|(_, not, _)| not.is_some())
        .parse(input)
    {
        return Ok((
            rest,
            Expression::IsNull {
                operand: Box::new(left),
                negated,
            },
        ));
    }

    let (after_not, negated) = match keyword("NOT").parse(input) {
        Ok((rest, _)) => (rest, true),
        Err(_) => (input, false),
    };

    if let Ok((rest, _)) = keyword("IN").parse(after_not) {
        let (rest, list) = context("expected a parenthesized list after IN", cut(parenthesized_list))
            .parse(rest)?;
        return Ok((
            rest,
            Expression::InList {
                operand: Box::new(left),
                list,
                negated,
            },
        ));
    }
    if let Ok((rest, _)) = keyword("LIKE").parse(after_not) {
        let (rest, pattern) = cut(parse_additive).parse(rest)?;
        return Ok((
            rest,
            Expression::Like {
                operand: Box::new(left),
                pattern: Box::new(pattern),
                negated,
            },
        ));
    }
    if let Ok((rest, _)) = keyword("BETWEEN").parse(after_not) {
        let (rest, (low, _, high)) = context(
            "expected `low AND high` after BETWEEN",
            cut((parse_additive, keyword("AND"), parse_additive)),
        )
        .parse(rest)?;
        return Ok((
            rest,
            Expression::Between {
                operand: Box::new(left),
                low: Box::new(low),
                high: Box::new(high),
                negated,
            },
        ));
    }
    if negated {
        return Err(nom::Err::Failure(ParseTrace::new(
            after_not,
            "expected IN, LIKE or BETWEEN after NOT",
        )));
    }

    if let Ok((rest, operator)) = comparison_operator(input) {
        let (rest, right) = cut(parse_additive).parse(rest)?;
        return Ok((rest, Expression::binary(operator, left, right)));
    }
    Ok((input, left))
}

fn parse_additive(input: &str) -> PResult<'_, Expression> {
    let (mut input, mut acc) = parse_multiplicative(input)?;
    loop {
        match ws(one_of("+-")).parse(input) {
            Ok((rest, op)) => {
                let (rest, right) = cut(parse_multiplicative).parse(rest)?;
                let operator = if op == '+' {
                    BinaryOperator::Add
                } else {
                    BinaryOperator::Subtract
                };
                acc = Expression::binary(operator, acc, right);
                input = rest;
            }
            Err(nom::Err::Error(_)) => return Ok((input, acc)),
            Err(e) => return Err(e),
        }
    }
}

fn parse_multiplicative(input: &str) -> PResult<'_, Expression> {
    let (mut input, mut acc) = parse_primary(input)?;
    loop {
        match ws(one_of("*/")).parse(input) {
            Ok((rest, op)) => {
                let (rest, right) = cut(parse_primary).parse(rest)?;
                let operator = if op == '*' {
                    BinaryOperator::Multiply
                } else {
                    BinaryOperator::Divide
                };
                acc = Expression::binary(operator, acc, right);
                input = rest;
            }
            Err(nom::Err::Error(_)) => return Ok((input, acc)),
            Err(e) => return Err(e),
        }
    }
}

fn parse_primary(input: &str) -> PResult<'_, Expression> {
    ws(alt((
        delimited(sym('('), parse_expression, sym(')')),
        map(parse_parameter, Expression::Parameter),
        map(parse_literal, Expression::Literal),
        parse_function_call,
        map(path_expression, Expression::Path),
    )))
    .parse(input)
}

fn parse_parameter(input: &str) -> PResult<'_, ParameterRef> {
    alt((
        map(preceded(char(':'), identifier), |name: &str| {
            ParameterRef::Named(name.to_string())
        }),
        parse_positional_parameter,
    ))
    .parse(input)
}

fn parse_positional_parameter(input: &str) -> PResult<'_, ParameterRef> {
    let parsed: PResult<'_, &str> = preceded(char('?'), digit1).parse(input);
    let (rest, digits) = parsed?;
    let position = digits.parse::<u32>().map_err(|_| {
        nom::Err::Failure(ParseTrace::new(input, "positional parameter out of range"))
    })?;
    if position == 0 {
        return Err(nom::Err::Failure(ParseTrace::new(
            input,
            "positional parameters start at ?1",
        )));
    }
    Ok((rest, ParameterRef::Positional(position)))
}

fn parse_literal(input: &str) -> PResult<'_, Literal> {
    alt((
        map(keyword("NULL"), |_| Literal::Null),
        map(keyword("TRUE"), |_| Literal::Boolean(true)),
        map(keyword("FALSE"), |_| Literal::Boolean(false)),
        map(parse_string_literal, Literal::String),
        parse_number,
    ))
    .parse(input)
}

fn parse_number(input: &str) -> PResult<'_, Literal> {
    let parsed: PResult<'_, &str> = recognize(pair(
        opt(char('-')),
        pair(digit1, opt(pair(char('.'), digit1))),
    ))
    .parse(input);
    let (rest, raw) = parsed?;
    if raw.contains('.') {
        let value = raw
            .parse::<f64>()
            .map_err(|_| nom::Err::Failure(ParseTrace::new(input, "invalid float literal")))?;
        Ok((rest, Literal::Float(value)))
    } else {
        let value = raw
            .parse::<i64>()
            .map_err(|_| nom::Err::Failure(ParseTrace::new(input, "integer literal out of range")))?;
        Ok((rest, Literal::Integer(value)))
    }
}

/// `'text'` with `''` as an escaped quote.
fn parse_string_literal(input: &str) -> PResult<'_, String> {
    let opened: PResult<'_, char> = char('\'').parse(input);
    let (mut rest, _) = opened?;
    let mut out = String::new();
    loop {
        let Some(pos) = rest.find('\'') else {
            return Err(nom::Err::Failure(ParseTrace::new(
                input,
                "unterminated string literal",
            )));
        };
        out.push_str(&rest[..pos]);
        rest = &rest[pos + 1..];
        if let Some(after) = rest.strip_prefix('\'') {
            out.push('\'');
            rest = after;
        } else {
            return Ok((rest, out));
        }
    }
}

fn parse_function_call(input: &str) -> PResult<'_, Expression> {
    let (rest, name) = identifier(input)?;
    let (rest, _) = sym('(').parse(rest)?;

    if name.eq_ignore_ascii_case("count") {
        if let Ok((rest, _)) = (sym('*'), sym(')')).parse(rest) {
            return Ok((rest, Expression::CountStar));
        }
    }

    let (rest, distinct) = opt(keyword("DISTINCT")).parse(rest)?;
    let (rest, arguments) = context(
        "invalid function arguments",
        cut(separated_list1(comma, parse_expression)),
    )
    .parse(rest)?;
    let (rest, _) = context("expected `)` to close function call", cut(sym(')')))
        .parse(rest)?;
    Ok((
        rest,
        Expression::Function {
            name: name.to_ascii_lowercase(),
            arguments,
            distinct: distinct.is_some(),
        },
    ))
}
