//! Convenient imports for typical `sqlgate` usage.
//!
//! ```ignore
//! use sqlgate::prelude::*;
//! ```

pub use crate::ast::{
    ColumnRef, Params, Predicate, Statement, TableRef, Value, and, delete, insert, lit, not, or,
    param, select, update,
};
pub use crate::compile::compile;
pub use crate::dialect::Dialect;
pub use crate::driver::{Driver, ExecOutcome, RowSet};
pub use crate::engine::QueryEngine;
pub use crate::error::{GateError, GateResult};
pub use crate::schema::{Column, ColumnType, SchemaBuilder, Table};
pub use crate::source::SchemaSource;
pub use crate::{SchemaSnapshot, SqlgateConfig};
