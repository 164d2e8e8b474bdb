//! SQL dialects.
//!
//! [`Dialect`] is the closed set of supported targets; each one has a
//! [`DialectImpl`] describing its surface syntax (identifier quoting,
//! placeholder style, type names) and which constructs it can express.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use crate::schema::ColumnType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Postgres,
    Sqlite,
    MySql,
}

impl Dialect {
    /// The implementation describing this dialect.
    pub fn implementation(self) -> &'static dyn DialectImpl {
        match self {
            Self::Postgres => &PostgresDialect,
            Self::Sqlite => &SqliteDialect,
            Self::MySql => &MySqlDialect,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
            Self::MySql => "mysql",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "sqlite" => Ok(Self::Sqlite),
            "mysql" => Ok(Self::MySql),
            other => Err(format!("unknown dialect '{other}'")),
        }
    }
}

/// Surface syntax and capabilities of one dialect.
pub trait DialectImpl: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Character used to quote identifiers. Embedded quote characters are doubled.
    fn quote_char(&self) -> char {
        '"'
    }

    fn quote_ident(&self, ident: &str) -> String {
        let q = self.quote_char();
        let mut out = String::with_capacity(ident.len() + 2);
        out.push(q);
        for ch in ident.chars() {
            if ch == q {
                out.push(q);
            }
            out.push(ch);
        }
        out.push(q);
        out
    }

    /// Quoted string literal. Embedded single quotes are doubled.
    fn string_literal(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('\'');
        for ch in value.chars() {
            if ch == '\'' {
                out.push('\'');
            }
            out.push(ch);
        }
        out.push('\'');
        out
    }

    /// Placeholder text for the 1-based parameter `position`.
    fn placeholder(&self, position: usize) -> String;

    /// Whether one numbered placeholder can be referenced several times.
    /// When false, every occurrence gets its own slot.
    fn numbered_placeholders(&self) -> bool {
        false
    }

    /// Column type name used in this dialect's DDL.
    fn type_name(&self, ty: &ColumnType) -> String;

    fn supports_ilike(&self) -> bool {
        false
    }

    fn supports_full_join(&self) -> bool {
        true
    }

    fn supports_returning(&self) -> bool {
        true
    }

    /// LIMIT clause to emit when only an OFFSET was requested, for dialects
    /// that cannot express OFFSET on its own.
    fn limit_for_offset_only(&self) -> Option<&'static str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(PostgresDialect.quote_ident("users"), "\"users\"");
        assert_eq!(PostgresDialect.quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(MySqlDialect.quote_ident("order"), "`order`");
        assert_eq!(MySqlDialect.quote_ident("a`b"), "`a``b`");
        assert_eq!(SqliteDialect.quote_ident("users"), "\"users\"");
    }

    #[test]
    fn test_string_literal() {
        assert_eq!(PostgresDialect.string_literal("it's"), "'it''s'");
        assert_eq!(PostgresDialect.string_literal("\\"), "'\\'");
        assert_eq!(SqliteDialect.string_literal("\\"), "'\\'");
        assert_eq!(MySqlDialect.string_literal("\\"), "'\\\\'");
        assert_eq!(MySqlDialect.string_literal("a'b"), "'a''b'");
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(PostgresDialect.placeholder(3), "$3");
        assert_eq!(SqliteDialect.placeholder(3), "?");
        assert_eq!(MySqlDialect.placeholder(3), "?");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(PostgresDialect.type_name(&ColumnType::Binary), "BYTEA");
        assert_eq!(SqliteDialect.type_name(&ColumnType::Float), "REAL");
        assert_eq!(MySqlDialect.type_name(&ColumnType::Uuid), "CHAR(36)");
        assert_eq!(
            PostgresDialect.type_name(&ColumnType::custom("citext")),
            "CITEXT"
        );
    }

    #[test]
    fn test_dialect_parse_and_display() {
        for d in [Dialect::Postgres, Dialect::Sqlite, Dialect::MySql] {
            assert_eq!(d.to_string().parse::<Dialect>().unwrap(), d);
            assert_eq!(d.implementation().dialect(), d);
        }
        assert_eq!("PostgreSQL".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert!("oracle".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_dialect_serde() {
        let json = serde_json::to_string(&Dialect::MySql).unwrap();
        assert_eq!(json, "\"mysql\"");
        let d: Dialect = serde_json::from_str("\"sqlite\"").unwrap();
        assert_eq!(d, Dialect::Sqlite);
    }
}
