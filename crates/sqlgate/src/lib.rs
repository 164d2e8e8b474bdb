//! # sqlgate
//!
//! Schema-checked SQL statements.
//!
//! ## Features
//!
//! - **Fail-fast**: unknown tables/columns, type mismatches, unbound placeholders
//!   and NULLs into NOT NULL columns are rejected before any SQL is produced
//! - **Offline validation**: check statements against a versioned schema snapshot,
//!   no database connection required
//! - **Dialects**: PostgreSQL, SQLite and MySQL from the same statement tree
//! - **Statement cache**: compiled statements are keyed by a structural
//!   fingerprint, shared across concurrent callers (singleflight) and evicted
//!   by LRU and TTL
//! - **Safe defaults**: DELETE requires WHERE, UPDATE requires SET
//!
//! ## Example
//!
//! ```ignore
//! use sqlgate::prelude::*;
//!
//! let source = SchemaSource::snapshot_file("schema/snapshot.json")?;
//! let users = TableRef::new("users");
//!
//! let stmt = select(&users)
//!     .columns([users.col("id"), users.col("email")])
//!     .filter(users.col("email").eq("a@b.com"))
//!     .build(&source, Params::new())?;
//!
//! let compiled = compile(&stmt, Dialect::Postgres)?;
//! assert_eq!(
//!     compiled.sql,
//!     r#"SELECT "id", "email" FROM "users" WHERE "email" = $1"#
//! );
//! ```

pub mod ast;
pub mod cache;
pub mod compile;
pub mod config;
pub mod dialect;
pub mod driver;
pub mod engine;
pub mod error;
pub mod prelude;
pub mod schema;
pub mod snapshot;
pub mod source;
pub mod validate;

pub use ast::{
    ColumnRef, Fingerprint, Operand, Params, Predicate, QueryNode, Statement, TableRef, Value, and,
    delete, insert, lit, not, or, param, select, update,
};
pub use cache::{CacheStats, CachedStatement, StatementCache, StatementCacheConfig};
pub use compile::{CompiledSql, ParamSlot, SlotSource, compile};
pub use config::SqlgateConfig;
pub use dialect::{Dialect, DialectImpl};
pub use driver::{Driver, ExecOutcome, RowSet};
pub use engine::QueryEngine;
pub use error::{
    CacheError, CompileError, ConfigError, DriverError, GateError, GateResult, SchemaError,
    ValidationError,
};
pub use schema::{
    Column, ColumnType, Constraint, SchemaBuilder, SchemaDrift, SchemaRegistry, Table,
};
pub use snapshot::SchemaSnapshot;
pub use source::{SchemaSource, SchemaSourceKind, SharedSchema};
pub use validate::{ResolvedColumn, ValidatedStatement, validate, validate_against};
