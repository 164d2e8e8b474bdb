//! MySQL dialect

use super::{Dialect, DialectImpl};
use crate::schema::ColumnType;

/// MySQL dialect
pub struct MySqlDialect;

impl DialectImpl for MySqlDialect {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn quote_char(&self) -> char {
        '`'
    }

    // backslash is an escape inside string literals unless NO_BACKSLASH_ESCAPES is set
    fn string_literal(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('\'');
        for ch in value.chars() {
            match ch {
                '\'' => out.push_str("''"),
                '\\' => out.push_str("\\\\"),
                _ => out.push(ch),
            }
        }
        out.push('\'');
        out
    }

    fn placeholder(&self, _position: usize) -> String {
        "?".to_string()
    }

    fn type_name(&self, ty: &ColumnType) -> String {
        match ty {
            ColumnType::Integer => "BIGINT",
            ColumnType::Float => "DOUBLE",
            ColumnType::Text => "VARCHAR(255)",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Timestamp => "DATETIME",
            ColumnType::Binary => "LONGBLOB",
            ColumnType::Json => "JSON",
            ColumnType::Uuid => "CHAR(36)",
            ColumnType::Custom(name) => return name.to_ascii_uppercase(),
        }
        .to_string()
    }

    fn supports_full_join(&self) -> bool {
        false
    }

    fn supports_returning(&self) -> bool {
        false
    }

    fn limit_for_offset_only(&self) -> Option<&'static str> {
        Some("18446744073709551615")
    }
}
