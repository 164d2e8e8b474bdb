//! Statement nodes and their consuming builders.

use super::expr::{ColumnRef, Operand, Predicate, TableRef};
use super::value::Value;
use crate::error::GateResult;
use crate::schema::SchemaRegistry;
use crate::source::SchemaSource;
use crate::validate::{self, ValidatedStatement};
use std::fmt;
use std::sync::Arc;

/// Clause of a statement, used to locate validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Clause {
    Projection,
    Join,
    Where,
    OrderBy,
    Limit,
    Values,
    Set,
    Returning,
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Projection => "SELECT",
            Self::Join => "JOIN ON",
            Self::Where => "WHERE",
            Self::OrderBy => "ORDER BY",
            Self::Limit => "LIMIT",
            Self::Values => "VALUES",
            Self::Set => "SET",
            Self::Returning => "RETURNING",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Full => "FULL JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: TableRef,
    pub on: Predicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One `ORDER BY` term. Build with [`ColumnRef::asc`] / [`ColumnRef::desc`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderBy {
    pub column: ColumnRef,
    pub direction: Direction,
}

impl OrderBy {
    pub fn new(column: ColumnRef, direction: Direction) -> Self {
        Self { column, direction }
    }
}

/// Values for named placeholders, supplied when a statement is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, Value)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value to a placeholder name.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((name.into(), value.into()));
        self
    }

    /// First value bound to `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `SELECT` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub(crate) table: TableRef,
    pub(crate) projection: Vec<ColumnRef>,
    pub(crate) joins: Vec<Join>,
    pub(crate) predicate: Option<Predicate>,
    pub(crate) order_by: Vec<OrderBy>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
}

impl Select {
    pub fn new(table: &TableRef) -> Self {
        Self {
            table: table.clone(),
            projection: Vec::new(),
            joins: Vec::new(),
            predicate: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Replace the projection. An empty projection selects every column of
    /// every table in scope.
    pub fn columns<I: IntoIterator<Item = ColumnRef>>(mut self, columns: I) -> Self {
        self.projection = columns.into_iter().collect();
        self
    }

    /// Append one column to the projection.
    pub fn column(mut self, column: ColumnRef) -> Self {
        self.projection.push(column);
        self
    }

    pub fn join(mut self, kind: JoinKind, table: &TableRef, on: Predicate) -> Self {
        self.joins.push(Join {
            kind,
            table: table.clone(),
            on,
        });
        self
    }

    pub fn inner_join(self, table: &TableRef, on: Predicate) -> Self {
        self.join(JoinKind::Inner, table, on)
    }

    pub fn left_join(self, table: &TableRef, on: Predicate) -> Self {
        self.join(JoinKind::Left, table, on)
    }

    pub fn right_join(self, table: &TableRef, on: Predicate) -> Self {
        self.join(JoinKind::Right, table, on)
    }

    pub fn full_join(self, table: &TableRef, on: Predicate) -> Self {
        self.join(JoinKind::Full, table, on)
    }

    /// Add a WHERE condition, ANDed with any previous one.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = and_into(self.predicate, predicate);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }
}

/// A single `INSERT` row: `(column, operand)` pairs.
pub type InsertRow = Vec<(String, Operand)>;

/// `INSERT` statement, possibly multi-row.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub(crate) table: TableRef,
    pub(crate) rows: Vec<InsertRow>,
    pub(crate) returning: Vec<ColumnRef>,
}

impl Insert {
    pub fn new(table: &TableRef) -> Self {
        Self {
            table: table.clone(),
            rows: Vec::new(),
            returning: Vec::new(),
        }
    }

    /// Set a column on the current row (starting the first row if needed).
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Operand>) -> Self {
        if self.rows.is_empty() {
            self.rows.push(Vec::new());
        }
        if let Some(row) = self.rows.last_mut() {
            row.push((column.into(), value.into()));
        }
        self
    }

    /// Start a new row. Every row must name the same columns as the first.
    pub fn next_row(mut self) -> Self {
        self.rows.push(Vec::new());
        self
    }

    /// Append a complete row.
    pub fn row<I, C, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (C, V)>,
        C: Into<String>,
        V: Into<Operand>,
    {
        self.rows.push(
            values
                .into_iter()
                .map(|(c, v)| (c.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn returning<I: IntoIterator<Item = ColumnRef>>(mut self, columns: I) -> Self {
        self.returning.extend(columns);
        self
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn rows(&self) -> &[InsertRow] {
        &self.rows
    }

    /// Column order of the statement: the order of the first row.
    pub fn column_names(&self) -> Vec<&str> {
        self.rows
            .first()
            .map(|r| r.iter().map(|(c, _)| c.as_str()).collect())
            .unwrap_or_default()
    }

    /// Operand for `column` in row `row`.
    pub fn operand(&self, row: usize, column: &str) -> Option<&Operand> {
        self.rows
            .get(row)?
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }
}

/// `UPDATE` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub(crate) table: TableRef,
    pub(crate) assignments: Vec<(String, Operand)>,
    pub(crate) predicate: Option<Predicate>,
    pub(crate) returning: Vec<ColumnRef>,
}

impl Update {
    pub fn new(table: &TableRef) -> Self {
        Self {
            table: table.clone(),
            assignments: Vec::new(),
            predicate: None,
            returning: Vec::new(),
        }
    }

    /// `SET column = value`
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Operand>) -> Self {
        self.assignments.push((column.into(), value.into()));
        self
    }

    /// Add a WHERE condition, ANDed with any previous one.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = and_into(self.predicate, predicate);
        self
    }

    pub fn returning<I: IntoIterator<Item = ColumnRef>>(mut self, columns: I) -> Self {
        self.returning.extend(columns);
        self
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    pub fn assignments(&self) -> &[(String, Operand)] {
        &self.assignments
    }
}

/// `DELETE` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub(crate) table: TableRef,
    pub(crate) predicate: Option<Predicate>,
    pub(crate) returning: Vec<ColumnRef>,
    pub(crate) allow_all: bool,
}

impl Delete {
    pub fn new(table: &TableRef) -> Self {
        Self {
            table: table.clone(),
            predicate: None,
            returning: Vec::new(),
            allow_all: false,
        }
    }

    /// Add a WHERE condition, ANDed with any previous one.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = and_into(self.predicate, predicate);
        self
    }

    /// Allow DELETE without WHERE. Refused at validation otherwise.
    pub fn allow_delete_all(mut self, allow: bool) -> Self {
        self.allow_all = allow;
        self
    }

    pub fn returning<I: IntoIterator<Item = ColumnRef>>(mut self, columns: I) -> Self {
        self.returning.extend(columns);
        self
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }
}

fn and_into(existing: Option<Predicate>, next: Predicate) -> Option<Predicate> {
    Some(match existing {
        Some(p) => p.and(next),
        None => next,
    })
}

/// Any statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
}

impl QueryNode {
    /// Target table (FROM table for SELECT).
    pub fn table(&self) -> &TableRef {
        match self {
            Self::Select(s) => &s.table,
            Self::Insert(i) => &i.table,
            Self::Update(u) => &u.table,
            Self::Delete(d) => &d.table,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Select(_) => "select",
            Self::Insert(_) => "insert",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
        }
    }

    /// RETURNING columns (always empty for SELECT).
    pub fn returning(&self) -> &[ColumnRef] {
        match self {
            Self::Select(_) => &[],
            Self::Insert(i) => &i.returning,
            Self::Update(u) => &u.returning,
            Self::Delete(d) => &d.returning,
        }
    }

    /// Visit every operand with its clause, in the order the compiler renders them.
    pub(crate) fn for_each_operand<'a>(&'a self, mut f: impl FnMut(Clause, &'a Operand)) {
        match self {
            Self::Select(s) => {
                for join in &s.joins {
                    join.on.walk_operands(&mut |o| f(Clause::Join, o));
                }
                if let Some(p) = &s.predicate {
                    p.walk_operands(&mut |o| f(Clause::Where, o));
                }
            }
            Self::Insert(i) => {
                let columns = i.column_names();
                for row in 0..i.rows.len() {
                    for column in &columns {
                        if let Some(o) = i.operand(row, column) {
                            f(Clause::Values, o);
                        }
                    }
                }
            }
            Self::Update(u) => {
                for (_, o) in &u.assignments {
                    f(Clause::Set, o);
                }
                if let Some(p) = &u.predicate {
                    p.walk_operands(&mut |o| f(Clause::Where, o));
                }
            }
            Self::Delete(d) => {
                if let Some(p) = &d.predicate {
                    p.walk_operands(&mut |o| f(Clause::Where, o));
                }
            }
        }
    }

    /// Literal values in rendering order.
    pub(crate) fn literals(&self) -> Vec<Value> {
        let mut out = Vec::new();
        self.for_each_operand(|_, o| {
            if let Operand::Literal(v) = o {
                out.push(v.clone());
            }
        });
        out
    }
}

impl From<Select> for QueryNode {
    fn from(s: Select) -> Self {
        Self::Select(s)
    }
}

impl From<Insert> for QueryNode {
    fn from(i: Insert) -> Self {
        Self::Insert(i)
    }
}

impl From<Update> for QueryNode {
    fn from(u: Update) -> Self {
        Self::Update(u)
    }
}

impl From<Delete> for QueryNode {
    fn from(d: Delete) -> Self {
        Self::Delete(d)
    }
}

/// Terminal operations shared by every statement builder.
pub trait Statement: Into<QueryNode> {
    /// Validate against the registry currently published by `source`.
    fn build(self, source: &SchemaSource, params: Params) -> GateResult<ValidatedStatement> {
        validate::validate(self.into(), source, params)
    }

    /// Validate against an explicit registry.
    fn build_with(
        self,
        registry: Arc<SchemaRegistry>,
        params: Params,
    ) -> GateResult<ValidatedStatement> {
        validate::validate_against(self.into(), registry, params)
    }
}

impl Statement for Select {}
impl Statement for Insert {}
impl Statement for Update {}
impl Statement for Delete {}
impl Statement for QueryNode {}

pub fn select(table: &TableRef) -> Select {
    Select::new(table)
}

pub fn insert(table: &TableRef) -> Insert {
    Insert::new(table)
}

pub fn update(table: &TableRef) -> Update {
    Update::new(table)
}

pub fn delete(table: &TableRef) -> Delete {
    Delete::new(table)
}
