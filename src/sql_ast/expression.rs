use std::collections::BTreeSet;

use crate::domain_model::ValueMapping;
use crate::value::Value;

/// A physical column bound to the alias of a table already in the statement.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct ColumnReference {
    pub table_alias: String,
    pub column: String,
    pub mapping: ValueMapping,
}

impl ColumnReference {
    pub fn new(table_alias: impl Into<String>, column: impl Into<String>, mapping: ValueMapping) -> Self {
        ColumnReference {
            table_alias: table_alias.into(),
            column: column.into(),
            mapping,
        }
    }
}

/// Where a bound value comes from at execution time.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub enum ParameterSource {
    Named(String),
    /// 1-based.
    Positional(u32),
    /// A literal from the query text that is bound rather than inlined.
    Literal(Value),
}

impl std::fmt::Display for ParameterSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterSource::Named(name) => write!(f, ":{}", name),
            ParameterSource::Positional(pos) => write!(f, "?{}", pos),
            ParameterSource::Literal(value) => write!(f, "literal '{}'", value),
        }
    }
}

/// Bind descriptor: value source plus the encoding strategy. `None` means the
/// mapping is inferred from the supplied value.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct ParameterBinding {
    pub source: ParameterSource,
    pub mapping: Option<ValueMapping>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    Addition,
    Subtraction,
    Multiplication,
    Division,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "<>",
            Operator::LessThan => "<",
            Operator::LessThanEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanEqual => ">=",
            Operator::Addition => "+",
            Operator::Subtraction => "-",
            Operator::Multiplication => "*",
            Operator::Division => "/",
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum SqlExpr {
    Column(ColumnReference),
    /// Rendered inline; only non-text literals end up here.
    Literal(Value),
    Parameter(ParameterBinding),
    Binary {
        operator: Operator,
        left: Box<SqlExpr>,
        right: Box<SqlExpr>,
    },
    And(Vec<SqlExpr>),
    Or(Vec<SqlExpr>),
    Not(Box<SqlExpr>),
    IsNull {
        operand: Box<SqlExpr>,
        negated: bool,
    },
    InList {
        operand: Box<SqlExpr>,
        list: Vec<SqlExpr>,
        negated: bool,
    },
    Like {
        operand: Box<SqlExpr>,
        pattern: Box<SqlExpr>,
        negated: bool,
    },
    Between {
        operand: Box<SqlExpr>,
        low: Box<SqlExpr>,
        high: Box<SqlExpr>,
        negated: bool,
    },
    Function {
        name: String,
        arguments: Vec<SqlExpr>,
        distinct: bool,
    },
    CountStar,
}

impl SqlExpr {
    pub fn column(reference: ColumnReference) -> Self {
        SqlExpr::Column(reference)
    }

    pub fn equals(left: SqlExpr, right: SqlExpr) -> Self {
        SqlExpr::Binary {
            operator: Operator::Equal,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// AND `other` onto an optional predicate, flattening nested conjunctions.
    pub fn and_with(existing: Option<SqlExpr>, other: SqlExpr) -> SqlExpr {
        match existing {
            None => other,
            Some(SqlExpr::And(mut items)) => {
                items.push(other);
                SqlExpr::And(items)
            }
            Some(expr) => SqlExpr::And(vec![expr, other]),
        }
    }

    /// Value mapping of the expression when it can be known statically.
    pub fn mapping(&self) -> Option<ValueMapping> {
        match self {
            SqlExpr::Column(column) => Some(column.mapping),
            SqlExpr::Parameter(binding) => binding.mapping,
            _ => None,
        }
    }

    /// Give an unmapped parameter the mapping of the operand it is compared
    /// against.
    pub fn infer_parameter_mapping(&mut self, mapping: Option<ValueMapping>) {
        if let (SqlExpr::Parameter(binding), Some(mapping)) = (self, mapping) {
            if binding.mapping.is_none() {
                binding.mapping = Some(mapping);
            }
        }
    }

    /// Visit every column reference in the expression.
    pub fn for_each_column<'a>(&'a self, visit: &mut impl FnMut(&'a ColumnReference)) {
        match self {
            SqlExpr::Column(column) => visit(column),
            SqlExpr::Literal(_) | SqlExpr::Parameter(_) | SqlExpr::CountStar => {}
            SqlExpr::Binary { left, right, .. } => {
                left.for_each_column(visit);
                right.for_each_column(visit);
            }
            SqlExpr::And(items) | SqlExpr::Or(items) => {
                items.iter().for_each(|item| item.for_each_column(visit));
            }
            SqlExpr::Not(inner) => inner.for_each_column(visit),
            SqlExpr::IsNull { operand, .. } => operand.for_each_column(visit),
            SqlExpr::InList { operand, list, .. } => {
                operand.for_each_column(visit);
                list.iter().for_each(|item| item.for_each_column(visit));
            }
            SqlExpr::Like {
                operand, pattern, ..
            } => {
                operand.for_each_column(visit);
                pattern.for_each_column(visit);
            }
            SqlExpr::Between {
                operand, low, high, ..
            } => {
                operand.for_each_column(visit);
                low.for_each_column(visit);
                high.for_each_column(visit);
            }
            SqlExpr::Function { arguments, .. } => {
                arguments.iter().for_each(|arg| arg.for_each_column(visit));
            }
        }
    }

    /// Table aliases referenced by this expression.
    pub fn table_aliases(&self) -> BTreeSet<&str> {
        let mut aliases = BTreeSet::new();
        self.for_each_column(&mut |column| {
            aliases.insert(column.table_alias.as_str());
        });
        aliases
    }
}
