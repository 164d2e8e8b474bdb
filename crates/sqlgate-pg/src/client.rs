//! Connection trait for sqlgate-pg
//!
//! A minimal surface over the things that can run statements: a plain
//! `tokio_postgres::Client`, a transaction, or a pooled client.

use crate::error::{PgError, PgResult};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Row, Statement};

/// A PostgreSQL connection the driver can prepare and run statements on.
///
/// Prepared statements belong to the connection that prepared them and must
/// not be used on another one.
#[async_trait::async_trait]
pub trait PgConn: Send + Sync {
    /// Run unprepared SQL and return all rows. Used for catalog queries.
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgResult<Vec<Row>>;

    /// Prepare a statement on this connection.
    async fn prepare(&self, sql: &str) -> PgResult<Statement>;

    /// Execute a prepared statement and return all rows.
    async fn query_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> PgResult<Vec<Row>>;

    /// Execute a prepared statement and return the number of affected rows.
    async fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> PgResult<u64>;

    /// Prepare through a cache owned by the connection itself, if it has one.
    ///
    /// The default prepares every time.
    async fn prepare_cached(&self, sql: &str) -> PgResult<Statement> {
        self.prepare(sql).await
    }

    /// Drop `sql` from the connection's own cache, if it has one.
    fn forget_prepared(&self, sql: &str) {
        let _ = sql;
    }
}

#[async_trait::async_trait]
impl PgConn for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgResult<Vec<Row>> {
        tokio_postgres::Client::query(self, sql, params)
            .await
            .map_err(PgError::from)
    }

    async fn prepare(&self, sql: &str) -> PgResult<Statement> {
        tokio_postgres::Client::prepare(self, sql)
            .await
            .map_err(PgError::from)
    }

    async fn query_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> PgResult<Vec<Row>> {
        tokio_postgres::Client::query(self, stmt, params)
            .await
            .map_err(PgError::from)
    }

    async fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> PgResult<u64> {
        tokio_postgres::Client::execute(self, stmt, params)
            .await
            .map_err(PgError::from)
    }
}

#[async_trait::async_trait]
impl PgConn for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgResult<Vec<Row>> {
        tokio_postgres::Transaction::query(self, sql, params)
            .await
            .map_err(PgError::from)
    }

    async fn prepare(&self, sql: &str) -> PgResult<Statement> {
        tokio_postgres::Transaction::prepare(self, sql)
            .await
            .map_err(PgError::from)
    }

    async fn query_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> PgResult<Vec<Row>> {
        tokio_postgres::Transaction::query(self, stmt, params)
            .await
            .map_err(PgError::from)
    }

    async fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> PgResult<u64> {
        tokio_postgres::Transaction::execute(self, stmt, params)
            .await
            .map_err(PgError::from)
    }
}

// ===== deadpool-postgres support =====

#[cfg(feature = "pool")]
#[async_trait::async_trait]
impl PgConn for deadpool_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgResult<Vec<Row>> {
        // Delegate to the deref target (ClientWrapper / tokio_postgres::Client).
        PgConn::query(&***self, sql, params).await
    }

    async fn prepare(&self, sql: &str) -> PgResult<Statement> {
        PgConn::prepare(&***self, sql).await
    }

    async fn query_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> PgResult<Vec<Row>> {
        PgConn::query_prepared(&***self, stmt, params).await
    }

    async fn execute_prepared(
        &self,
        stmt: &Statement,
        params: &[&(dyn ToSql + Sync)],
    ) -> PgResult<u64> {
        PgConn::execute_prepared(&***self, stmt, params).await
    }

    async fn prepare_cached(&self, sql: &str) -> PgResult<Statement> {
        deadpool_postgres::ClientWrapper::prepare_cached(self, sql)
            .await
            .map_err(PgError::from)
    }

    fn forget_prepared(&self, sql: &str) {
        let _ = self.statement_cache.remove(sql, &[]);
    }
}

/// Extension trait for accessing row columns with better error handling.
pub trait RowExt {
    /// Get a column value by name, returning a [`PgError::Decode`] on failure.
    fn try_get_column<'a, T>(&'a self, column: &str) -> PgResult<T>
    where
        T: tokio_postgres::types::FromSql<'a>;
}

impl RowExt for Row {
    fn try_get_column<'a, T>(&'a self, column: &str) -> PgResult<T>
    where
        T: tokio_postgres::types::FromSql<'a>,
    {
        self.try_get(column)
            .map_err(|e| PgError::decode(column, e.to_string()))
    }
}
