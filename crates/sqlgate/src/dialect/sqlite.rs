//! SQLite dialect

use super::{Dialect, DialectImpl};
use crate::schema::ColumnType;

/// SQLite dialect
///
/// Booleans, timestamps, JSON and UUIDs have no storage class of their own
/// and are stored as INTEGER/TEXT.
pub struct SqliteDialect;

impl DialectImpl for SqliteDialect {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn placeholder(&self, _position: usize) -> String {
        "?".to_string()
    }

    fn type_name(&self, ty: &ColumnType) -> String {
        match ty {
            ColumnType::Integer | ColumnType::Boolean => "INTEGER",
            ColumnType::Float => "REAL",
            ColumnType::Text | ColumnType::Timestamp | ColumnType::Json | ColumnType::Uuid => {
                "TEXT"
            }
            ColumnType::Binary => "BLOB",
            ColumnType::Custom(name) => return name.to_ascii_uppercase(),
        }
        .to_string()
    }

    // SQLite cannot OFFSET without LIMIT; -1 means unbounded.
    fn limit_for_offset_only(&self) -> Option<&'static str> {
        Some("-1")
    }
}
