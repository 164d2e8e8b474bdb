//! Differences between a declared schema and the one a database reports.

use super::model::{ColumnType, Table};
use super::registry::SchemaRegistry;
use std::fmt;

/// One difference between a declared table and its live counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaDrift {
    /// Declared table not present in the database.
    MissingTable { table: String },
    /// Declared column not present in the database.
    MissingColumn { table: String, column: String },
    /// Column present in the database but not declared.
    UnexpectedColumn { table: String, column: String },
    TypeMismatch {
        table: String,
        column: String,
        expected: ColumnType,
        actual: ColumnType,
    },
    /// The primary keys differ (`None` means no primary key).
    PrimaryKeyMismatch {
        table: String,
        expected: Option<Vec<String>>,
        actual: Option<Vec<String>>,
    },
    NullabilityMismatch {
        table: String,
        column: String,
        expected_nullable: bool,
    },
}

impl SchemaDrift {
    pub fn table(&self) -> &str {
        match self {
            Self::MissingTable { table }
            | Self::MissingColumn { table, .. }
            | Self::UnexpectedColumn { table, .. }
            | Self::TypeMismatch { table, .. }
            | Self::PrimaryKeyMismatch { table, .. }
            | Self::NullabilityMismatch { table, .. } => table,
        }
    }
}

fn key_list(key: &Option<Vec<String>>) -> String {
    match key {
        Some(columns) => format!("({})", columns.join(", ")),
        None => "none".to_string(),
    }
}

fn null_str(nullable: bool) -> &'static str {
    if nullable { "NULL" } else { "NOT NULL" }
}

impl fmt::Display for SchemaDrift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTable { table } => write!(f, "table '{table}' not found in database"),
            Self::MissingColumn { table, column } => {
                write!(f, "column '{table}.{column}' not found in database")
            }
            Self::UnexpectedColumn { table, column } => {
                write!(f, "column '{table}.{column}' exists in database but is not declared")
            }
            Self::TypeMismatch {
                table,
                column,
                expected,
                actual,
            } => write!(f, "column '{table}.{column}': expected {expected}, got {actual}"),
            Self::PrimaryKeyMismatch {
                table,
                expected,
                actual,
            } => write!(
                f,
                "table '{table}': expected primary key {}, got {}",
                key_list(expected),
                key_list(actual)
            ),
            Self::NullabilityMismatch {
                table,
                column,
                expected_nullable,
            } => write!(
                f,
                "column '{table}.{column}': expected {}, got {}",
                null_str(*expected_nullable),
                null_str(!*expected_nullable)
            ),
        }
    }
}

/// Whether a declared type and a reported type denote the same storage.
///
/// The closed types are already normalized by [`ColumnType::from_sql_type`];
/// custom names compare case-insensitively, ignoring a schema qualifier.
fn types_compatible(expected: &ColumnType, actual: &ColumnType) -> bool {
    match (expected, actual) {
        (ColumnType::Custom(a), ColumnType::Custom(b)) => custom_name(a) == custom_name(b),
        _ => expected == actual,
    }
}

fn custom_name(name: &str) -> String {
    let unqualified = name.rsplit('.').next().unwrap_or(name);
    match unqualified.to_ascii_lowercase().as_str() {
        "decimal" => "numeric".to_string(),
        other => other.to_string(),
    }
}

fn table_drift(expected: &Table, actual: &Table, out: &mut Vec<SchemaDrift>) {
    let table = expected.name();
    let expected_key = expected.primary_key_columns();

    for column in expected.columns() {
        let Some(live) = actual.get_column(column.name()) else {
            out.push(SchemaDrift::MissingColumn {
                table: table.to_string(),
                column: column.name().to_string(),
            });
            continue;
        };
        if !types_compatible(column.column_type(), live.column_type()) {
            out.push(SchemaDrift::TypeMismatch {
                table: table.to_string(),
                column: column.name().to_string(),
                expected: column.column_type().clone(),
                actual: live.column_type().clone(),
            });
        }
        // key columns are NOT NULL whatever the catalog says
        let in_key = expected_key.is_some_and(|key| key.iter().any(|c| c == column.name()));
        if !in_key && column.is_nullable() != live.is_nullable() {
            out.push(SchemaDrift::NullabilityMismatch {
                table: table.to_string(),
                column: column.name().to_string(),
                expected_nullable: column.is_nullable(),
            });
        }
    }

    for live in actual.columns() {
        if !expected.has_column(live.name()) {
            out.push(SchemaDrift::UnexpectedColumn {
                table: table.to_string(),
                column: live.name().to_string(),
            });
        }
    }

    let actual_key = actual.primary_key_columns();
    if expected_key != actual_key {
        out.push(SchemaDrift::PrimaryKeyMismatch {
            table: table.to_string(),
            expected: expected_key.map(<[String]>::to_vec),
            actual: actual_key.map(<[String]>::to_vec),
        });
    }
}

impl SchemaRegistry {
    /// Compare every table declared here against `actual`, usually a
    /// registry introspected from the database.
    ///
    /// Tables present only in `actual` are ignored. The result is ordered by
    /// table name, then by column order; empty means no drift.
    pub fn diff(&self, actual: &SchemaRegistry) -> Vec<SchemaDrift> {
        let mut out = Vec::new();
        for table in self.tables() {
            match actual.get_table(table.name()) {
                Some(live) => table_drift(table, live, &mut out),
                None => out.push(SchemaDrift::MissingTable {
                    table: table.name().to_string(),
                }),
            }
        }
        out
    }
}
