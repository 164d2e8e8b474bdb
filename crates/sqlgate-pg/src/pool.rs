//! Connection pool driver

use crate::driver::run_statement;
use crate::error::{PgError, PgResult};
use crate::introspect::introspect;
use deadpool_postgres::{Manager, ManagerConfig, Pool, PoolBuilder, RecyclingMethod};
use sqlgate::{
    CachedStatement, Dialect, Driver, DriverError, ExecOutcome, SchemaRegistry, SqlgateConfig,
    Value,
};
use tokio_postgres::NoTls;
use tokio_postgres::Socket;
use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};

/// Create a connection pool from a database URL.
///
/// Uses `NoTls` and a max size of 16. Use [`create_pool_with_manager_config`]
/// for TLS or tuning.
pub fn create_pool(database_url: &str) -> PgResult<Pool> {
    create_pool_with_config(database_url, 16)
}

/// Create a connection pool with a custom max size.
pub fn create_pool_with_config(database_url: &str, max_size: usize) -> PgResult<Pool> {
    create_pool_with_manager_config(database_url, NoTls, default_manager_config(), |builder| {
        builder.max_size(max_size)
    })
}

/// Create a connection pool with injected `deadpool_postgres::ManagerConfig` and `PoolBuilder`.
pub fn create_pool_with_manager_config<T>(
    database_url: &str,
    tls: T,
    manager_config: ManagerConfig,
    configure_pool: impl FnOnce(PoolBuilder) -> PoolBuilder,
) -> PgResult<Pool>
where
    T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
    T::Stream: Sync + Send,
    T::TlsConnect: Sync + Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    let pg_config: tokio_postgres::Config = database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| PgError::Config(e.to_string()))?;

    let mgr = Manager::from_config(pg_config, tls, manager_config);
    configure_pool(Pool::builder(mgr))
        .build()
        .map_err(|e| PgError::Pool(e.to_string()))
}

fn default_manager_config() -> ManagerConfig {
    ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    }
}

/// Runs compiled statements on pooled connections.
///
/// Each pooled connection prepares through its own statement cache, so a
/// statement is prepared at most once per connection.
#[derive(Clone)]
pub struct PgPoolDriver {
    pool: Pool,
    schemas: Vec<String>,
}

impl PgPoolDriver {
    pub fn new(pool: Pool) -> Self {
        Self {
            pool,
            schemas: vec!["public".to_string()],
        }
    }

    /// Build a pool from `[database].url` and use `[database].schemas`.
    pub fn from_config(config: &SqlgateConfig) -> PgResult<Self> {
        let url = config
            .database
            .url
            .as_deref()
            .ok_or_else(|| PgError::Config("database.url is not set".to_string()))?;
        let pool = create_pool(url)?;
        Ok(Self::new(pool).with_schemas(config.database.schemas.iter().cloned()))
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

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn schemas(&self) -> &[String] {
        &self.schemas
    }

    pub async fn introspect(&self) -> PgResult<SchemaRegistry> {
        let client = self.pool.get().await?;
        introspect(&client, &self.schemas).await
    }

    pub async fn run(&self, statement: &CachedStatement, args: &[Value]) -> PgResult<ExecOutcome> {
        let client = self.pool.get().await?;
        run_statement(&client, None, statement, args).await
    }
}

#[async_trait::async_trait]
impl Driver for PgPoolDriver {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_pool_rejects_bad_url() {
        let err = create_pool("not a url ::").unwrap_err();
        assert!(matches!(err, PgError::Config(_)));
    }

    #[test]
    fn test_from_config_requires_url() {
        let config = SqlgateConfig::default();
        let err = PgPoolDriver::from_config(&config).err().unwrap();
        assert!(matches!(err, PgError::Config(_)));
    }

    #[test]
    fn test_from_config_uses_schemas() {
        let mut config = SqlgateConfig::default();
        config.database.url = Some("postgres://localhost/app".to_string());
        config.database.schemas = vec!["app".to_string(), "public".to_string()];

        let driver = PgPoolDriver::from_config(&config).unwrap();
        assert_eq!(driver.schemas(), ["app", "public"]);
        assert_eq!(driver.pool().status().max_size, 16);
        assert_eq!(driver.dialect(), Dialect::Postgres);
    }
}
