//! PostgreSQL dialect

use super::{Dialect, DialectImpl};
use crate::schema::ColumnType;

/// PostgreSQL dialect
pub struct PostgresDialect;

impl DialectImpl for PostgresDialect {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn placeholder(&self, position: usize) -> String {
        format!("${position}")
    }

    fn numbered_placeholders(&self) -> bool {
        true
    }

    fn type_name(&self, ty: &ColumnType) -> String {
        match ty {
            ColumnType::Integer => "BIGINT",
            ColumnType::Float => "DOUBLE PRECISION",
            ColumnType::Text => "TEXT",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Timestamp => "TIMESTAMPTZ",
            ColumnType::Binary => "BYTEA",
            ColumnType::Json => "JSONB",
            ColumnType::Uuid => "UUID",
            ColumnType::Custom(name) => return name.to_ascii_uppercase(),
        }
        .to_string()
    }

    fn supports_ilike(&self) -> bool {
        true
    }
}
