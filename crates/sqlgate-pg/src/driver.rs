//! [`Driver`] implementation over a single PostgreSQL connection.

use crate::client::PgConn;
use crate::convert::{SqlArg, decode_row};
use crate::error::{PgError, PgResult};
use crate::introspect::introspect;
use crate::prepared::{PreparedCache, is_retryable_prepared_error};
use sqlgate::{
    CachedStatement, Dialect, Driver, DriverError, ExecOutcome, RowSet, SchemaRegistry,
    SqlgateConfig, Value,
};
use tokio_postgres::Statement;
use tokio_postgres::types::ToSql;

/// Prepared statements kept per connection unless configured otherwise.
pub const DEFAULT_PREPARED_CAPACITY: usize = 128;

/// Runs compiled statements on one connection (or transaction), keeping an
/// LRU of the statements it has prepared there.
///
/// ```ignore
/// let (client, connection) = tokio_postgres::connect(&url, NoTls).await?;
/// tokio::spawn(connection);
///
/// let driver = PgDriver::from_config(client, &config);
/// let engine = QueryEngine::connect(&config, driver).await?;
/// ```
pub struct PgDriver<C> {
    conn: C,
    schemas: Vec<String>,
    prepared: PreparedCache,
}

impl<C: PgConn> PgDriver<C> {
    /// Driver over `conn`, introspecting the `public` schema.
    pub fn new(conn: C) -> Self {
        Self {
            conn,
            schemas: vec!["public".to_string()],
            prepared: PreparedCache::new(DEFAULT_PREPARED_CAPACITY),
        }
    }

    /// Driver over `conn` using `[database].schemas` from the configuration.
    pub fn from_config(conn: C, config: &SqlgateConfig) -> Self {
        Self::new(conn).with_schemas(config.database.schemas.iter().cloned())
    }

    /// Schemas to introspect, in lookup order.
    pub fn with_schemas<I, S>(mut self, schemas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schemas = schemas.into_iter().map(Into::into).collect();
        self
    }

    /// Maximum number of prepared statements kept on the connection.
    /// 0 disables the cache.
    pub fn with_prepared_capacity(mut self, capacity: usize) -> Self {
        self.prepared = PreparedCache::new(capacity);
        self
    }

    pub fn schemas(&self) -> &[String] {
        &self.schemas
    }

    pub fn conn(&self) -> &C {
        &self.conn
    }

    pub fn into_inner(self) -> C {
        self.conn
    }

    /// Number of statements currently prepared through this driver.
    pub fn prepared_len(&self) -> usize {
        self.prepared.len()
    }

    pub fn prepared_capacity(&self) -> usize {
        self.prepared.capacity()
    }

    /// Forget every prepared statement, e.g. after DDL on the connection.
    pub fn clear_prepared(&self) {
        self.prepared.clear();
    }

    /// Read the catalog of the configured schemas.
    pub async fn introspect(&self) -> PgResult<SchemaRegistry> {
        introspect(&self.conn, &self.schemas).await
    }

    /// Execute a compiled statement with its ordered arguments.
    pub async fn run(&self, statement: &CachedStatement, args: &[Value]) -> PgResult<ExecOutcome> {
        run_statement(&self.conn, Some(&self.prepared), statement, args).await
    }
}

#[async_trait::async_trait]
impl<C: PgConn> Driver for PgDriver<C> {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn introspect_schema(&self) -> Result<SchemaRegistry, DriverError> {
        self.introspect().await.map_err(DriverError::from)
    }

    async fn execute(
        &self,
        statement: &CachedStatement,
        args: &[Value],
    ) -> Result<ExecOutcome, DriverError> {
        self.run(statement, args).await.map_err(DriverError::from)
    }
}

/// Execute `statement` on `conn`, re-preparing once if the server reports the
/// prepared statement as stale.
///
/// With `prepared = None` the connection's own cache is used
/// ([`PgConn::prepare_cached`]).
pub(crate) async fn run_statement<C: PgConn + ?Sized>(
    conn: &C,
    prepared: Option<&PreparedCache>,
    statement: &CachedStatement,
    args: &[Value],
) -> PgResult<ExecOutcome> {
    match run_once(conn, prepared, statement, args).await {
        Err(err) if is_retryable_prepared_error(&err) => {
            tracing::debug!(
                target: "sqlgate_pg",
                fingerprint = %statement.fingerprint(),
                sqlstate = err.sqlstate().unwrap_or_default(),
                "prepared statement is stale, preparing again"
            );
            if let Some(cache) = prepared {
                cache.remove(statement.sql());
            }
            conn.forget_prepared(statement.sql());
            run_once(conn, prepared, statement, args).await
        }
        other => other,
    }
}

async fn prepare<C: PgConn + ?Sized>(
    conn: &C,
    prepared: Option<&PreparedCache>,
    sql: &str,
) -> PgResult<Statement> {
    let Some(cache) = prepared else {
        return conn.prepare_cached(sql).await;
    };
    if let Some(stmt) = cache.get(sql) {
        return Ok(stmt);
    }
    let stmt = conn.prepare(sql).await?;
    tracing::trace!(target: "sqlgate_pg", sql, "prepared");
    Ok(cache.insert_if_absent(sql, stmt))
}

async fn run_once<C: PgConn + ?Sized>(
    conn: &C,
    prepared: Option<&PreparedCache>,
    statement: &CachedStatement,
    args: &[Value],
) -> PgResult<ExecOutcome> {
    let stmt = prepare(conn, prepared, statement.sql()).await?;
    if stmt.params().len() != args.len() {
        return Err(PgError::Unsupported(format!(
            "statement takes {} parameters, {} supplied",
            stmt.params().len(),
            args.len()
        )));
    }

    let bound: Vec<SqlArg<'_>> = args.iter().map(SqlArg).collect();
    let params: Vec<&(dyn ToSql + Sync)> = bound
        .iter()
        .map(|arg| arg as &(dyn ToSql + Sync))
        .collect();

    if statement.returns_rows() {
        let rows = conn.query_prepared(&stmt, &params).await?;
        let mut set = RowSet::new(statement.columns().to_vec());
        set.rows = rows.iter().map(decode_row).collect::<PgResult<_>>()?;
        Ok(ExecOutcome::Rows(set))
    } else {
        let affected = conn.execute_prepared(&stmt, &params).await?;
        Ok(ExecOutcome::Affected(affected))
    }
}
