//! Boundary to the database.
//!
//! A driver owns connections and wire-level details. The engine only ever
//! hands it statements that passed validation and compilation, together with
//! their ordered arguments.

use crate::ast::Value;
use crate::cache::CachedStatement;
use crate::dialect::Dialect;
use crate::error::DriverError;
use crate::schema::SchemaRegistry;
use crate::validate::ResolvedColumn;

/// Decoded result rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<ResolvedColumn>,
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn new(columns: Vec<ResolvedColumn>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a result column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Value of column `name` in row `row`.
    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        let idx = self.column_index(name)?;
        self.rows.get(row)?.get(idx)
    }
}

/// What executing a statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    /// SELECT, or a mutation with RETURNING.
    Rows(RowSet),
    /// Mutation without RETURNING: number of affected rows.
    Affected(u64),
}

impl ExecOutcome {
    /// Rows, if the statement produced any result set.
    pub fn rows(&self) -> Option<&RowSet> {
        match self {
            Self::Rows(rows) => Some(rows),
            Self::Affected(_) => None,
        }
    }

    /// Rows returned, or rows affected.
    pub fn count(&self) -> u64 {
        match self {
            Self::Rows(rows) => rows.len() as u64,
            Self::Affected(n) => *n,
        }
    }
}

/// A database backend.
///
/// Implementations decide whether `statement` produces rows from
/// [`CachedStatement::returns_rows`].
#[async_trait::async_trait]
pub trait Driver: Send + Sync {
    /// Dialect statements are compiled for.
    fn dialect(&self) -> Dialect;

    /// Read the live catalog into a frozen registry.
    async fn introspect_schema(&self) -> Result<SchemaRegistry, DriverError>;

    /// Execute a compiled statement with its ordered arguments.
    async fn execute(
        &self,
        statement: &CachedStatement,
        args: &[Value],
    ) -> Result<ExecOutcome, DriverError>;
}

#[async_trait::async_trait]
impl<D: Driver + ?Sized> Driver for std::sync::Arc<D> {
    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    async fn introspect_schema(&self) -> Result<SchemaRegistry, DriverError> {
        (**self).introspect_schema().await
    }

    async fn execute(
        &self,
        statement: &CachedStatement,
        args: &[Value],
    ) -> Result<ExecOutcome, DriverError> {
        (**self).execute(statement, args).await
    }
}
