//! Error types for sqlgate

use crate::ast::Clause;
use crate::dialect::Dialect;
use crate::schema::ColumnType;
use thiserror::Error;

/// Result type alias for sqlgate operations
pub type GateResult<T> = Result<T, GateError>;

/// Schema registration, lookup and snapshot errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// A table with the same name was already registered.
    #[error("Duplicate table: '{0}'")]
    DuplicateTable(String),

    /// A table declares the same column twice.
    #[error("Duplicate column '{column}' in table '{table}'")]
    DuplicateColumn { table: String, column: String },

    /// A constraint is structurally invalid (e.g. two primary keys).
    #[error("Invalid constraint on table '{table}': {message}")]
    InvalidConstraint { table: String, message: String },

    /// Referenced table does not exist.
    #[error("Unknown table: '{0}'")]
    UnknownTable(String),

    /// Referenced column does not exist on its table.
    #[error("Unknown column '{column}' on table '{table}'")]
    UnknownColumn { table: String, column: String },

    /// A constraint references a table or column that does not exist.
    #[error("Dangling reference from '{table}': {message}")]
    DanglingReference { table: String, message: String },

    /// Snapshot was written with a format this build does not understand.
    #[error("Unsupported snapshot format_version {found} (supported: {supported:?})")]
    SnapshotVersionMismatch { found: u64, supported: Vec<u64> },

    /// Snapshot document could not be decoded.
    #[error("Malformed snapshot: {0}")]
    MalformedSnapshot(String),
}

/// Semantic errors found while checking a statement against a schema.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The statement itself is not well formed (independent of the schema).
    #[error("Malformed {clause} clause: {message}")]
    MalformedStatement { clause: Clause, message: String },

    /// A value or column is not compatible with the column it is bound against.
    #[error("Type mismatch in {clause} on {table}.{column}: expected {expected}, found {found}")]
    TypeMismatch {
        clause: Clause,
        table: String,
        column: String,
        expected: ColumnType,
        found: String,
    },

    /// Placeholders and supplied parameters do not line up one-to-one.
    #[error("Parameter arity mismatch: {message} (placeholders: {expected}, bound: {supplied})")]
    ParameterArityMismatch {
        expected: usize,
        supplied: usize,
        message: String,
    },

    /// A NULL is bound against a NOT NULL column.
    #[error("NULL bound to non-nullable column {table}.{column} in {clause}")]
    NullabilityViolation {
        clause: Clause,
        table: String,
        column: String,
    },
}

/// Lowering errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// The target dialect cannot express a construct without changing its meaning.
    #[error("{dialect} does not support {construct}")]
    UnsupportedConstruct {
        dialect: Dialect,
        construct: &'static str,
    },

    /// A parameter slot has no value in the statement it is being bound from.
    #[error("No argument available for parameter slot {0}")]
    MissingArgument(usize),
}

/// Statement cache misconfiguration. Eviction and expiry never produce errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("Statement cache capacity must be positive")]
    InvalidCapacity,

    #[error("Statement cache TTL must be positive")]
    InvalidTtl,
}

/// Errors reported by a [`Driver`](crate::driver::Driver) implementation.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Database returned an error.
    #[error("Database error: {0}")]
    Database(String),

    /// A column value could not be decoded into a [`Value`](crate::ast::Value).
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// The backend cannot represent a value or type.
    #[error("Unsupported by driver: {0}")]
    Unsupported(String),

    /// Other errors.
    #[error("{0}")]
    Other(String),
}

impl DriverError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Umbrella error for the public API.
#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Snapshot file I/O.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GateError {
    /// Check if this is a schema error (unknown table/column, bad snapshot, ...)
    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema(_))
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Borrow the schema error, if any.
    pub fn as_schema(&self) -> Option<&SchemaError> {
        match self {
            Self::Schema(e) => Some(e),
            _ => None,
        }
    }

    /// Borrow the validation error, if any.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(e) => Some(e),
            _ => None,
        }
    }

    /// Borrow the compile error, if any.
    pub fn as_compile(&self) -> Option<&CompileError> {
        match self {
            Self::Compile(e) => Some(e),
            _ => None,
        }
    }
}
