//! # sqlgate-pg
//!
//! PostgreSQL driver for `sqlgate`, over `tokio-postgres`.
//!
//! - [`PgDriver`] runs compiled statements on one connection or transaction
//!   and keeps an LRU of prepared statements for it.
//! - [`PgPoolDriver`] (feature `pool`) does the same over a `deadpool-postgres`
//!   pool.
//! - [`introspect`] reads `pg_catalog` into a `SchemaRegistry`, which is what
//!   `QueryEngine::connect` uses when `schema_source = "database"`.
//!
//! ```ignore
//! use sqlgate::{QueryEngine, SqlgateConfig};
//! use sqlgate_pg::PgPoolDriver;
//!
//! let config = SqlgateConfig::load("sqlgate.toml")?;
//! let engine = QueryEngine::connect(&config, PgPoolDriver::from_config(&config)?).await?;
//! ```

pub mod client;
pub mod convert;
pub mod driver;
pub mod error;
pub mod introspect;
#[cfg(feature = "pool")]
pub mod pool;
mod prepared;

pub use client::{PgConn, RowExt};
pub use convert::{Cell, SqlArg, decode_row};
pub use driver::{DEFAULT_PREPARED_CAPACITY, PgDriver};
pub use error::{PgError, PgResult};
pub use introspect::{
    CatalogColumn, CatalogConstraint, ConstraintKind, build_registry, column_type, introspect,
};
#[cfg(feature = "pool")]
pub use pool::{
    PgPoolDriver, create_pool, create_pool_with_config, create_pool_with_manager_config,
};

// Re-export the driver crates for convenience
#[cfg(feature = "pool")]
pub use deadpool_postgres;
pub use tokio_postgres;
