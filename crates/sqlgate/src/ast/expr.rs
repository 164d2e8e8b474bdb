//! Table/column handles, operands and predicates.

use super::statement::{Direction, OrderBy};
use super::value::Value;
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// Handle to a table by name.
///
/// Names are resolved against the schema at validation time, so a handle can
/// be created before (or without) any registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    name: String,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reference one of this table's columns.
    pub fn col(&self, column: impl Into<String>) -> ColumnRef {
        ColumnRef {
            table: self.name.clone(),
            column: column.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Qualified column reference (`table.column`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    table: String,
    column: String,
}

impl ColumnRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    fn compare(&self, op: CompareOp, operand: impl Into<Operand>) -> Predicate {
        Predicate::Comparison {
            column: self.clone(),
            op,
            operand: operand.into(),
        }
    }

    /// `column = operand`
    pub fn eq(&self, operand: impl Into<Operand>) -> Predicate {
        self.compare(CompareOp::Eq, operand)
    }

    /// `column <> operand`
    pub fn ne(&self, operand: impl Into<Operand>) -> Predicate {
        self.compare(CompareOp::Ne, operand)
    }

    /// `column < operand`
    pub fn lt(&self, operand: impl Into<Operand>) -> Predicate {
        self.compare(CompareOp::Lt, operand)
    }

    /// `column <= operand`
    pub fn le(&self, operand: impl Into<Operand>) -> Predicate {
        self.compare(CompareOp::Le, operand)
    }

    /// `column > operand`
    pub fn gt(&self, operand: impl Into<Operand>) -> Predicate {
        self.compare(CompareOp::Gt, operand)
    }

    /// `column >= operand`
    pub fn ge(&self, operand: impl Into<Operand>) -> Predicate {
        self.compare(CompareOp::Ge, operand)
    }

    fn like_pred(
        &self,
        pattern: Operand,
        escape: Option<char>,
        case_insensitive: bool,
        negated: bool,
    ) -> Predicate {
        Predicate::Like {
            column: self.clone(),
            pattern,
            escape,
            case_insensitive,
            negated,
        }
    }

    /// `column LIKE pattern`
    pub fn like(&self, pattern: impl Into<Operand>) -> Predicate {
        self.like_pred(pattern.into(), None, false, false)
    }

    /// `column LIKE pattern ESCAPE 'c'`
    pub fn like_escape(&self, pattern: impl Into<Operand>, escape: char) -> Predicate {
        self.like_pred(pattern.into(), Some(escape), false, false)
    }

    /// `column ILIKE pattern` (PostgreSQL only).
    pub fn ilike(&self, pattern: impl Into<Operand>) -> Predicate {
        self.like_pred(pattern.into(), None, true, false)
    }

    /// `column NOT LIKE pattern`
    pub fn not_like(&self, pattern: impl Into<Operand>) -> Predicate {
        self.like_pred(pattern.into(), None, false, true)
    }

    /// `column IN (...)`. An empty list never matches.
    pub fn in_list<I, T>(&self, values: I) -> Predicate
    where
        I: IntoIterator<Item = T>,
        T: Into<Operand>,
    {
        Predicate::In {
            column: self.clone(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    /// `column NOT IN (...)`. An empty list always matches.
    pub fn not_in<I, T>(&self, values: I) -> Predicate
    where
        I: IntoIterator<Item = T>,
        T: Into<Operand>,
    {
        Predicate::In {
            column: self.clone(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    /// `column IS NULL`
    pub fn is_null(&self) -> Predicate {
        Predicate::IsNull {
            column: self.clone(),
            negated: false,
        }
    }

    /// `column IS NOT NULL`
    pub fn is_not_null(&self) -> Predicate {
        Predicate::IsNull {
            column: self.clone(),
            negated: true,
        }
    }

    /// Ascending ordering on this column.
    pub fn asc(&self) -> OrderBy {
        OrderBy::new(self.clone(), Direction::Asc)
    }

    /// Descending ordering on this column.
    pub fn desc(&self) -> OrderBy {
        OrderBy::new(self.clone(), Direction::Desc)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Right-hand side of a comparison or an inserted/assigned value.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Column(ColumnRef),
    /// Named placeholder, bound through [`Params`](super::Params).
    Placeholder(String),
    Literal(Value),
}

/// Literal operand.
pub fn lit(value: impl Into<Value>) -> Operand {
    Operand::Literal(value.into())
}

/// Named placeholder operand.
pub fn param(name: impl Into<String>) -> Operand {
    Operand::Placeholder(name.into())
}

impl From<ColumnRef> for Operand {
    fn from(c: ColumnRef) -> Self {
        Operand::Column(c)
    }
}

impl From<&ColumnRef> for Operand {
    fn from(c: &ColumnRef) -> Self {
        Operand::Column(c.clone())
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Literal(v)
    }
}

macro_rules! impl_operand_from_literal {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Operand {
                fn from(v: $ty) -> Self {
                    Operand::Literal(Value::from(v))
                }
            }
        )*
    };
}

impl_operand_from_literal!(
    i64,
    i32,
    i16,
    u32,
    f64,
    f32,
    bool,
    String,
    &str,
    DateTime<Utc>,
    Vec<u8>,
    serde_json::Value,
    Uuid,
);

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    /// `<`, `<=`, `>`, `>=`
    pub fn is_ordering(self) -> bool {
        matches!(self, Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }
}

/// Boolean condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Comparison {
        column: ColumnRef,
        op: CompareOp,
        operand: Operand,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Like {
        column: ColumnRef,
        pattern: Operand,
        escape: Option<char>,
        case_insensitive: bool,
        negated: bool,
    },
    In {
        column: ColumnRef,
        values: Vec<Operand>,
        negated: bool,
    },
    IsNull {
        column: ColumnRef,
        negated: bool,
    },
}

impl Predicate {
    /// `self AND other`, flattening nested ANDs.
    pub fn and(self, other: Predicate) -> Predicate {
        match self {
            Predicate::And(mut parts) => {
                parts.push(other);
                Predicate::And(parts)
            }
            p => Predicate::And(vec![p, other]),
        }
    }

    /// `self OR other`, flattening nested ORs.
    pub fn or(self, other: Predicate) -> Predicate {
        match self {
            Predicate::Or(mut parts) => {
                parts.push(other);
                Predicate::Or(parts)
            }
            p => Predicate::Or(vec![p, other]),
        }
    }

    /// `NOT self`
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }

    /// Visit every column this predicate references, in rendering order.
    pub(crate) fn walk_columns<'a>(&'a self, f: &mut impl FnMut(&'a ColumnRef)) {
        match self {
            Predicate::Comparison {
                column, operand, ..
            } => {
                f(column);
                if let Operand::Column(c) = operand {
                    f(c);
                }
            }
            Predicate::And(parts) | Predicate::Or(parts) => {
                for p in parts {
                    p.walk_columns(f);
                }
            }
            Predicate::Not(inner) => inner.walk_columns(f),
            Predicate::Like {
                column, pattern, ..
            } => {
                f(column);
                if let Operand::Column(c) = pattern {
                    f(c);
                }
            }
            Predicate::In { column, values, .. } => {
                f(column);
                for v in values {
                    if let Operand::Column(c) = v {
                        f(c);
                    }
                }
            }
            Predicate::IsNull { column, .. } => f(column),
        }
    }

    /// Visit every operand, in rendering order.
    pub(crate) fn walk_operands<'a>(&'a self, f: &mut impl FnMut(&'a Operand)) {
        match self {
            Predicate::Comparison { operand, .. } => f(operand),
            Predicate::And(parts) | Predicate::Or(parts) => {
                for p in parts {
                    p.walk_operands(f);
                }
            }
            Predicate::Not(inner) => inner.walk_operands(f),
            Predicate::Like { pattern, .. } => f(pattern),
            Predicate::In { values, .. } => values.iter().for_each(f),
            Predicate::IsNull { .. } => {}
        }
    }
}

/// AND of all predicates. An empty input yields an empty conjunction (always true).
pub fn and<I: IntoIterator<Item = Predicate>>(predicates: I) -> Predicate {
    Predicate::And(predicates.into_iter().collect())
}

/// OR of all predicates. An empty input yields an empty disjunction (always false).
pub fn or<I: IntoIterator<Item = Predicate>>(predicates: I) -> Predicate {
    Predicate::Or(predicates.into_iter().collect())
}

/// Negate a predicate.
pub fn not(predicate: Predicate) -> Predicate {
    predicate.not()
}
