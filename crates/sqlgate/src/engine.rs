//! Validate → fingerprint → cache/compile → execute.
//!
//! ```ignore
//! let config = SqlgateConfig::load("sqlgate.toml")?;
//! let engine = QueryEngine::connect(&config, driver).await?;
//!
//! let users = TableRef::new("users");
//! let outcome = engine
//!     .run(
//!         select(&users).filter(users.col("email").eq(param("email"))),
//!         Params::new().bind("email", "a@b.com"),
//!     )
//!     .await?;
//! ```


use crate::ast::{Params, Statement};
use crate::cache::{CacheStats, CachedStatement, StatementCache};
use crate::compile::compile;
use crate::config::SqlgateConfig;
use crate::dialect::Dialect;
use crate::driver::{Driver, ExecOutcome};
use crate::error::{ConfigError, GateResult};
use crate::schema::{SchemaDrift, SchemaRegistry};
use crate::source::{SchemaSource, SchemaSourceKind};
use crate::validate::{ValidatedStatement, validate_against};
use std::borrow::Cow;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Runs statements through validation, the statement cache and a driver.
pub struct QueryEngine<D> {
    source: SchemaSource,
    cache: Arc<StatementCache>,
    driver: D,
    sweeper: Option<JoinHandle<()>>,
}

impl<D: Driver> QueryEngine<D> {
    pub fn new(source: SchemaSource, cache: Arc<StatementCache>, driver: D) -> Self {
        Self {
            source,
            cache,
            driver,
            sweeper: None,
        }
    }

    /// Build an engine from configuration: load the snapshot file or
    /// introspect the database, create the cache and start its sweeper.
    pub async fn connect(config: &SqlgateConfig, driver: D) -> GateResult<Self> {
        config.validate()?;
        let cache = Arc::new(StatementCache::new(config.cache_config())?);

        let source = match config.schema_source {
            SchemaSourceKind::Snapshot => {
                let path = config.snapshot_path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("schema_source = \"snapshot\" requires snapshot_path".into())
                })?;
                SchemaSource::snapshot_file(path)?
            }
            SchemaSourceKind::Database => {
                let registry = driver.introspect_schema().await?;
                tracing::info!(
                    target: "sqlgate.schema",
                    tables = registry.len(),
                    "introspected database schema"
                );
                SchemaSource::database(registry)
            }
        };

        let sweeper = config
            .sweep_interval()
            .map(|interval| cache.spawn_sweeper(interval));

        Ok(Self {
            source,
            cache,
            driver,
            sweeper,
        })
    }

    pub fn source(&self) -> &SchemaSource {
        &self.source
    }

    pub fn cache(&self) -> &Arc<StatementCache> {
        &self.cache
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn dialect(&self) -> Dialect {
        self.driver.dialect()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Validate a statement against the current registry.
    pub fn build<S: Statement>(&self, stmt: S, params: Params) -> GateResult<ValidatedStatement> {
        stmt.build(&self.source, params)
    }

    /// Re-validate `stmt` if it was checked against a registry that has
    /// since been replaced.
    fn current<'a>(&self, stmt: &'a ValidatedStatement) -> GateResult<Cow<'a, ValidatedStatement>> {
        let registry = self.source.registry();
        if Arc::ptr_eq(stmt.registry(), &registry) {
            return Ok(Cow::Borrowed(stmt));
        }
        tracing::debug!(
            target: "sqlgate.schema",
            kind = stmt.node().kind(),
            table = stmt.node().table().name(),
            "revalidating statement against republished schema"
        );
        validate_against(stmt.node().clone(), registry, stmt.params().clone()).map(Cow::Owned)
    }

    /// Compiled statement for `stmt`, from the cache when possible.
    pub async fn prepare(&self, stmt: &ValidatedStatement) -> GateResult<Arc<CachedStatement>> {
        let stmt = self.current(stmt)?;
        self.prepare_current(&stmt).await
    }

    async fn prepare_current(&self, stmt: &ValidatedStatement) -> GateResult<Arc<CachedStatement>> {
        let dialect = self.dialect();
        let fingerprint = stmt.fingerprint(dialect);
        let generation = stmt.registry().generation();
        let cached = self
            .cache
            .get_or_compile_at(fingerprint, dialect, generation, || compile(stmt, dialect))
            .await?;
        Ok(cached)
    }

    /// Execute a validated statement.
    pub async fn execute(&self, stmt: &ValidatedStatement) -> GateResult<ExecOutcome> {
        let stmt = self.current(stmt)?;
        let cached = self.prepare_current(&stmt).await?;
        let args = stmt.arguments(cached.slots())?;

        tracing::debug!(
            target: "sqlgate.sql",
            fingerprint = %cached.fingerprint(),
            sql = cached.sql(),
            params = args.len(),
            "execute"
        );
        let outcome = self.driver.execute(&cached, &args).await?;
        Ok(outcome)
    }

    /// Validate and execute in one step.
    pub async fn run<S: Statement>(&self, stmt: S, params: Params) -> GateResult<ExecOutcome> {
        let validated = self.build(stmt, params)?;
        self.execute(&validated).await
    }

    /// Compare the registry in use with the live database catalog.
    ///
    /// Mostly useful in snapshot mode, to detect a snapshot that no longer
    /// matches the database. Each difference is logged as a warning.
    pub async fn check_drift(&self) -> GateResult<Vec<SchemaDrift>> {
        let live = self.driver.introspect_schema().await?;
        let drift = self.source.registry().diff(&live);
        for d in &drift {
            tracing::warn!(target: "sqlgate.schema", table = d.table(), "schema drift: {d}");
        }
        if drift.is_empty() {
            tracing::debug!(
                target: "sqlgate.schema",
                source = %self.source.kind(),
                "no schema drift"
            );
        }
        Ok(drift)
    }

    /// Re-read the schema (snapshot file or live catalog), publish it and
    /// drop every compiled statement.
    ///
    /// Statements compiled against the previous registry are never reused,
    /// even when they are cached by a call racing with the reload: cache
    /// entries carry the registry generation they were compiled against.
    pub async fn reload(&self) -> GateResult<Arc<SchemaRegistry>> {
        let registry = match self.source.kind() {
            SchemaSourceKind::Snapshot => self.source.reload_snapshot()?,
            SchemaSourceKind::Database => {
                let registry = self.driver.introspect_schema().await?;
                self.source.publish(registry);
                self.source.registry()
            }
        };
        self.cache.clear();
        tracing::info!(
            target: "sqlgate.schema",
            source = %self.source.kind(),
            tables = registry.len(),
            "schema reloaded"
        );
        Ok(registry)
    }
}

impl<D> Drop for QueryEngine<D> {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}
