use super::errors::LoweringError;
use super::walker::{literal_expr, PathTarget, QueryConverter};
use crate::domain_model::value_mapping::{BOOL, FLOAT64, INT64, STRING, UINT64};
use crate::domain_model::{SqlType, ValueMapping};
use crate::query_model::{BinaryOperator, Expression, Literal, ParameterRef};
use crate::sql_ast::{Operator, ParameterBinding, ParameterSource, SqlExpr};
use crate::value::Value;

const FUNCTIONS: [&str; 10] = [
    "count", "sum", "avg", "min", "max", "upper", "lower", "length", "abs", "coalesce",
];

impl QueryConverter<'_> {
    /// Lower an object-model expression. Paths become column references
    /// (joining as needed); entity-valued paths compare by identifier.
    pub(super) fn lower_expression(&mut self, expression: &Expression) -> Result<SqlExpr, LoweringError> {
        match expression {
            Expression::Path(path) => match self.resolve_path(path, false)? {
                PathTarget::Column(column) => Ok(SqlExpr::Column(column)),
                PathTarget::ForeignKey { column, .. } => Ok(SqlExpr::Column(column)),
                PathTarget::Entity(navigable) => {
                    let joined = self.joined_path(&navigable)?.clone();
                    let id = self.column(&navigable, &joined.entity.table, &joined.entity.identifier)?;
                    Ok(SqlExpr::Column(id))
                }
            },
            Expression::Literal(literal) => Ok(lower_literal(literal)),
            Expression::Parameter(parameter) => Ok(SqlExpr::Parameter(ParameterBinding {
                source: match parameter {
                    ParameterRef::Named(name) => ParameterSource::Named(name.clone()),
                    ParameterRef::Positional(position) => ParameterSource::Positional(*position),
                },
                mapping: None,
            })),
            Expression::Binary {
                operator,
                left,
                right,
            } => {
                let mut left = self.lower_expression(left)?;
                let mut right = self.lower_expression(right)?;
                let left_mapping = left.mapping();
                left.infer_parameter_mapping(right.mapping());
                right.infer_parameter_mapping(left_mapping);
                Ok(SqlExpr::Binary {
                    operator: lower_operator(*operator),
                    left: Box::new(left),
                    right: Box::new(right),
                })
            }
            Expression::And(items) => Ok(SqlExpr::And(self.lower_all(items)?)),
            Expression::Or(items) => Ok(SqlExpr::Or(self.lower_all(items)?)),
            Expression::Not(inner) => Ok(SqlExpr::Not(Box::new(self.lower_expression(inner)?))),
            Expression::IsNull { operand, negated } => Ok(SqlExpr::IsNull {
                operand: Box::new(self.lower_expression(operand)?),
                negated: *negated,
            }),
            Expression::InList {
                operand,
                list,
                negated,
            } => {
                let operand = self.lower_expression(operand)?;
                let mut list = self.lower_all(list)?;
                for item in &mut list {
                    item.infer_parameter_mapping(operand.mapping());
                }
                Ok(SqlExpr::InList {
                    operand: Box::new(operand),
                    list,
                    negated: *negated,
                })
            }
            Expression::Like {
                operand,
                pattern,
                negated,
            } => {
                let operand = self.lower_expression(operand)?;
                let mut pattern = self.lower_expression(pattern)?;
                pattern.infer_parameter_mapping(Some(STRING));
                Ok(SqlExpr::Like {
                    operand: Box::new(operand),
                    pattern: Box::new(pattern),
                    negated: *negated,
                })
            }
            Expression::Between {
                operand,
                low,
                high,
                negated,
            } => {
                let operand = self.lower_expression(operand)?;
                let mut low = self.lower_expression(low)?;
                let mut high = self.lower_expression(high)?;
                low.infer_parameter_mapping(operand.mapping());
                high.infer_parameter_mapping(operand.mapping());
                Ok(SqlExpr::Between {
                    operand: Box::new(operand),
                    low: Box::new(low),
                    high: Box::new(high),
                    negated: *negated,
                })
            }
            Expression::Function {
                name,
                arguments,
                distinct,
            } => {
                let name = name.to_ascii_lowercase();
                if !FUNCTIONS.contains(&name.as_str()) {
                    return Err(LoweringError::UnknownFunction { name });
                }
                Ok(SqlExpr::Function {
                    name,
                    arguments: self.lower_all(arguments)?,
                    distinct: *distinct,
                })
            }
            Expression::CountStar => Ok(SqlExpr::CountStar),
        }
    }

    fn lower_all(&mut self, expressions: &[Expression]) -> Result<Vec<SqlExpr>, LoweringError> {
        expressions
            .iter()
            .map(|e| self.lower_expression(e))
            .collect()
    }
}

fn lower_literal(literal: &Literal) -> SqlExpr {
    match literal {
        Literal::Null => SqlExpr::Literal(Value::Null),
        Literal::Boolean(b) => SqlExpr::Literal(Value::Bool(*b)),
        Literal::Integer(i) => SqlExpr::Literal(Value::Int(*i)),
        Literal::Float(f) => SqlExpr::Literal(Value::Float(*f)),
        // The mapping is left open so a comparison can fix it
        Literal::String(s) => literal_expr(Value::Text(s.clone()), None),
    }
}

fn lower_operator(operator: BinaryOperator) -> Operator {
    match operator {
        BinaryOperator::Equal => Operator::Equal,
        BinaryOperator::NotEqual => Operator::NotEqual,
        BinaryOperator::LessThan => Operator::LessThan,
        BinaryOperator::LessThanEqual => Operator::LessThanEqual,
        BinaryOperator::GreaterThan => Operator::GreaterThan,
        BinaryOperator::GreaterThanEqual => Operator::GreaterThanEqual,
        BinaryOperator::Add => Operator::Addition,
        BinaryOperator::Subtract => Operator::Subtraction,
        BinaryOperator::Multiply => Operator::Multiplication,
        BinaryOperator::Divide => Operator::Division,
    }
}

/// Mapping used to read a scalar select item back, when it can be known.
pub(super) fn scalar_mapping(expression: &SqlExpr) -> Option<ValueMapping> {
    match expression {
        SqlExpr::Column(column) => Some(column.mapping),
        SqlExpr::Parameter(binding) => binding.mapping,
        SqlExpr::Literal(value) => Some(ValueMapping::infer(value)),
        SqlExpr::CountStar => Some(INT64),
        SqlExpr::Binary {
            operator,
            left,
            right,
        } => match operator {
            Operator::Division => Some(FLOAT64),
            Operator::Addition | Operator::Subtraction | Operator::Multiplication => {
                numeric_result(scalar_mapping(left), scalar_mapping(right))
            }
            _ => Some(BOOL),
        },
        SqlExpr::And(_)
        | SqlExpr::Or(_)
        | SqlExpr::Not(_)
        | SqlExpr::IsNull { .. }
        | SqlExpr::InList { .. }
        | SqlExpr::Like { .. }
        | SqlExpr::Between { .. } => Some(BOOL),
        SqlExpr::Function {
            name, arguments, ..
        } => {
            let first = arguments.first().and_then(scalar_mapping);
            match name.as_str() {
                "count" | "length" => Some(INT64),
                "avg" => Some(FLOAT64),
                "upper" | "lower" => Some(STRING),
                "sum" => match first.map(|m| m.sql_type) {
                    Some(SqlType::Int64) => Some(INT64),
                    Some(SqlType::Uint64) => Some(UINT64),
                    _ => Some(FLOAT64),
                },
                _ => first.map(ValueMapping::into_nullable),
            }
        }
    }
}

fn numeric_result(left: Option<ValueMapping>, right: Option<ValueMapping>) -> Option<ValueMapping> {
    match (left.map(|m| m.sql_type), right.map(|m| m.sql_type)) {
        (Some(SqlType::Int64), Some(SqlType::Int64)) => Some(INT64),
        (Some(SqlType::Float64), _) | (_, Some(SqlType::Float64)) => Some(FLOAT64),
        _ => None,
    }
}
