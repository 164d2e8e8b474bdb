//! Read the PostgreSQL catalog into a [`SchemaRegistry`].
//!
//! Tables, views and foreign tables from the configured schemas are loaded
//! with their columns, nullability, defaults and primary key / unique /
//! foreign key constraints. Table names are registered unqualified; when the
//! same name exists in several schemas, the schema listed first wins, the way
//! `search_path` resolves it.

use crate::client::{PgConn, RowExt};
use crate::error::{PgError, PgResult};
use sqlgate::{Column, ColumnType, Constraint, SchemaBuilder, SchemaRegistry, Table};
use std::collections::{BTreeMap, HashSet};

/// One column as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumn {
    pub schema: String,
    pub table: String,
    pub name: String,
    /// `format_type` output, e.g. `character varying(255)`.
    pub data_type: String,
    pub not_null: bool,
    /// Has a default expression, or is an identity / generated column.
    pub has_default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
    ForeignKey,
}

impl ConstraintKind {
    fn from_contype(contype: i8) -> Option<Self> {
        // `contype` is a "char"; tokio-postgres exposes it as i8.
        match contype as u8 as char {
            'p' => Some(Self::PrimaryKey),
            'u' => Some(Self::Unique),
            'f' => Some(Self::ForeignKey),
            _ => None,
        }
    }
}

/// One constraint as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConstraint {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub kind: ConstraintKind,
    pub columns: Vec<String>,
    /// Referenced `(schema, table)` for foreign keys.
    pub references: Option<(String, String)>,
    pub references_columns: Vec<String>,
}

const COLUMNS_SQL: &str = r#"
SELECT
  n.nspname AS schema_name,
  c.relname AS table_name,
  a.attname AS column_name,
  pg_catalog.format_type(a.atttypid, a.atttypmod) AS data_type,
  a.attnotnull AS not_null,
  (ad.adbin IS NOT NULL
    OR COALESCE(a.attidentity::text, '') <> ''
    OR COALESCE(a.attgenerated::text, '') <> '') AS has_default
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
JOIN pg_catalog.pg_attribute a ON a.attrelid = c.oid
LEFT JOIN pg_catalog.pg_attrdef ad ON ad.adrelid = c.oid AND ad.adnum = a.attnum
WHERE c.relkind IN ('r', 'p', 'v', 'm', 'f')
  AND a.attnum > 0
  AND NOT a.attisdropped
  AND n.nspname = ANY($1::text[])
ORDER BY n.nspname, c.relname, a.attnum
"#;

const CONSTRAINTS_SQL: &str = r#"
SELECT
  n.nspname AS schema_name,
  c.relname AS table_name,
  con.conname AS constraint_name,
  con.contype AS contype,
  ARRAY(
    SELECT a.attname::text
    FROM unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord)
    JOIN pg_catalog.pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum
    ORDER BY k.ord
  ) AS columns,
  fn.nspname AS foreign_schema,
  fc.relname AS foreign_table,
  ARRAY(
    SELECT a.attname::text
    FROM unnest(con.confkey) WITH ORDINALITY AS k(attnum, ord)
    JOIN pg_catalog.pg_attribute a ON a.attrelid = con.confrelid AND a.attnum = k.attnum
    ORDER BY k.ord
  ) AS foreign_columns
FROM pg_catalog.pg_constraint con
JOIN pg_catalog.pg_class c ON c.oid = con.conrelid
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
LEFT JOIN pg_catalog.pg_class fc ON fc.oid = con.confrelid
LEFT JOIN pg_catalog.pg_namespace fn ON fn.oid = fc.relnamespace
WHERE con.contype IN ('p', 'u', 'f')
  AND n.nspname = ANY($1::text[])
ORDER BY n.nspname, c.relname, con.conname
"#;

pub async fn load_columns<C: PgConn + ?Sized>(
    conn: &C,
    schemas: &[String],
) -> PgResult<Vec<CatalogColumn>> {
    let rows = conn.query(COLUMNS_SQL, &[&schemas]).await?;
    rows.iter()
        .map(|row| {
            Ok(CatalogColumn {
                schema: row.try_get_column("schema_name")?,
                table: row.try_get_column("table_name")?,
                name: row.try_get_column("column_name")?,
                data_type: row.try_get_column("data_type")?,
                not_null: row.try_get_column("not_null")?,
                has_default: row.try_get_column("has_default")?,
            })
        })
        .collect()
}

pub async fn load_constraints<C: PgConn + ?Sized>(
    conn: &C,
    schemas: &[String],
) -> PgResult<Vec<CatalogConstraint>> {
    let rows = conn.query(CONSTRAINTS_SQL, &[&schemas]).await?;
    let mut constraints = Vec::with_capacity(rows.len());
    for row in rows {
        let contype: i8 = row.try_get_column("contype")?;
        let Some(kind) = ConstraintKind::from_contype(contype) else {
            continue;
        };
        let foreign_schema: Option<String> = row.try_get_column("foreign_schema")?;
        let foreign_table: Option<String> = row.try_get_column("foreign_table")?;
        constraints.push(CatalogConstraint {
            schema: row.try_get_column("schema_name")?,
            table: row.try_get_column("table_name")?,
            name: row.try_get_column("constraint_name")?,
            kind,
            columns: row.try_get_column("columns")?,
            references: foreign_schema.zip(foreign_table),
            references_columns: row.try_get_column("foreign_columns")?,
        });
    }
    Ok(constraints)
}

/// Introspect `schemas` and freeze the result.
pub async fn introspect<C: PgConn + ?Sized>(
    conn: &C,
    schemas: &[String],
) -> PgResult<SchemaRegistry> {
    if schemas.is_empty() {
        return Err(PgError::Config("no schemas to introspect".to_string()));
    }
    let columns = load_columns(conn, schemas).await?;
    let constraints = load_constraints(conn, schemas).await?;
    let registry = build_registry(schemas, columns, constraints)?;
    tracing::info!(
        target: "sqlgate_pg",
        schemas = ?schemas,
        tables = registry.len(),
        "introspected catalog"
    );
    Ok(registry)
}

/// Logical type for a `format_type` name. Arrays are kept as custom types.
pub fn column_type(data_type: &str) -> ColumnType {
    if data_type.ends_with("[]") {
        ColumnType::custom(data_type)
    } else {
        ColumnType::from_sql_type(data_type)
    }
}

/// Assemble catalog rows into a registry.
pub fn build_registry(
    schemas: &[String],
    columns: Vec<CatalogColumn>,
    constraints: Vec<CatalogConstraint>,
) -> PgResult<SchemaRegistry> {
    let precedence = |schema: &str| schemas.iter().position(|s| s == schema);

    let mut by_table: BTreeMap<(String, String), Vec<CatalogColumn>> = BTreeMap::new();
    for column in columns {
        by_table
            .entry((column.schema.clone(), column.table.clone()))
            .or_default()
            .push(column);
    }

    // table name -> schema that owns it
    let mut owners: BTreeMap<String, String> = BTreeMap::new();
    for (schema, table) in by_table.keys() {
        match owners.get(table).cloned() {
            Some(owner) if precedence(&owner) <= precedence(schema) => {
                tracing::warn!(
                    target: "sqlgate_pg",
                    table = %table,
                    shadowed = %schema,
                    owner = %owner,
                    "table name exists in several schemas; keeping the first"
                );
            }
            Some(owner) => {
                tracing::warn!(
                    target: "sqlgate_pg",
                    table = %table,
                    shadowed = %owner,
                    owner = %schema,
                    "table name exists in several schemas; keeping the first"
                );
                owners.insert(table.clone(), schema.clone());
            }
            None => {
                owners.insert(table.clone(), schema.clone());
            }
        }
    }
    let kept: HashSet<(String, String)> = owners
        .iter()
        .map(|(table, schema)| (schema.clone(), table.clone()))
        .collect();

    let mut tables: BTreeMap<(String, String), Table> = BTreeMap::new();
    for (key, cols) in by_table {
        if !kept.contains(&key) {
            continue;
        }
        let mut table = Table::new(key.1.clone());
        for col in cols {
            let mut column = Column::new(col.name, column_type(&col.data_type));
            if !col.not_null {
                column = column.nullable();
            }
            if col.has_default {
                column = column.with_default();
            }
            table = table.column(column);
        }
        tables.insert(key, table);
    }

    for con in constraints {
        let key = (con.schema, con.table);
        let Some(table) = tables.remove(&key) else {
            continue;
        };
        let constraint = match con.kind {
            ConstraintKind::PrimaryKey => Some(Constraint::PrimaryKey {
                columns: con.columns,
            }),
            ConstraintKind::Unique => Some(Constraint::Unique {
                columns: con.columns,
            }),
            ConstraintKind::ForeignKey => match con.references {
                Some(target) if kept.contains(&target) => Some(Constraint::ForeignKey {
                    columns: con.columns,
                    references_table: target.1,
                    references_columns: con.references_columns,
                }),
                target => {
                    tracing::debug!(
                        target: "sqlgate_pg",
                        constraint = %con.name,
                        references = ?target,
                        "skipping foreign key to a table outside the loaded schemas"
                    );
                    None
                }
            },
        };
        let table = match constraint {
            Some(c) => table.constraint(c),
            None => table,
        };
        tables.insert(key, table);
    }

    if tables.is_empty() {
        tracing::warn!(
            target: "sqlgate_pg",
            schemas = ?schemas,
            "no tables found in the selected schemas"
        );
    }

    let mut builder = SchemaBuilder::new();
    for table in tables.into_values() {
        builder.register(table)?;
    }
    Ok(builder.freeze()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlgate::SchemaError;

    fn col(schema: &str, table: &str, name: &str, data_type: &str) -> CatalogColumn {
        CatalogColumn {
            schema: schema.into(),
            table: table.into(),
            name: name.into(),
            data_type: data_type.into(),
            not_null: true,
            has_default: false,
        }
    }

    fn pk(schema: &str, table: &str, columns: &[&str]) -> CatalogConstraint {
        CatalogConstraint {
            schema: schema.into(),
            table: table.into(),
            name: format!("{table}_pkey"),
            kind: ConstraintKind::PrimaryKey,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            references: None,
            references_columns: Vec::new(),
        }
    }

    fn fk(schema: &str, table: &str, column: &str, target: (&str, &str)) -> CatalogConstraint {
        CatalogConstraint {
            schema: schema.into(),
            table: table.into(),
            name: format!("{table}_{column}_fkey"),
            kind: ConstraintKind::ForeignKey,
            columns: vec![column.to_string()],
            references: Some((target.0.into(), target.1.into())),
            references_columns: vec!["id".to_string()],
        }
    }

    fn public() -> Vec<String> {
        vec!["public".to_string()]
    }

    #[test]
    fn test_column_types() {
        assert_eq!(column_type("integer"), ColumnType::Integer);
        assert_eq!(column_type("character varying(255)"), ColumnType::Text);
        assert_eq!(column_type("timestamp with time zone"), ColumnType::Timestamp);
        assert_eq!(column_type("double precision"), ColumnType::Float);
        assert_eq!(column_type("jsonb"), ColumnType::Json);
        assert_eq!(column_type("integer[]"), ColumnType::custom("integer[]"));
        assert_eq!(column_type("numeric(10,2)"), ColumnType::custom("numeric"));
        assert_eq!(column_type("mood"), ColumnType::custom("mood"));
    }

    #[test]
    fn test_contype() {
        assert_eq!(ConstraintKind::from_contype(b'p' as i8), Some(ConstraintKind::PrimaryKey));
        assert_eq!(ConstraintKind::from_contype(b'f' as i8), Some(ConstraintKind::ForeignKey));
        assert_eq!(ConstraintKind::from_contype(b'c' as i8), None);
    }

    #[test]
    fn test_build_registry() {
        let mut id = col("public", "users", "id", "bigint");
        id.has_default = true;
        let mut name = col("public", "users", "name", "text");
        name.not_null = false;
        let columns = vec![
            id,
            col("public", "users", "email", "character varying(255)"),
            name,
            col("public", "posts", "id", "integer"),
            col("public", "posts", "user_id", "bigint"),
        ];
        let mut unique = pk("public", "users", &["email"]);
        unique.kind = ConstraintKind::Unique;
        let constraints = vec![
            pk("public", "users", &["id"]),
            unique,
            pk("public", "posts", &["id"]),
            fk("public", "posts", "user_id", ("public", "users")),
        ];

        let registry = build_registry(&public(), columns, constraints).unwrap();
        assert_eq!(registry.len(), 2);

        let users = registry.get_table("users").unwrap();
        let names: Vec<_> = users.columns().iter().map(|c| c.name()).collect();
        assert_eq!(names, ["id", "email", "name"]);
        assert!(users.get_column("id").unwrap().has_default());
        assert!(users.get_column("name").unwrap().is_nullable());
        assert!(!users.get_column("email").unwrap().is_nullable());
        assert_eq!(users.primary_key_columns(), Some(&["id".to_string()][..]));
        assert_eq!(users.constraints().len(), 2);

        let posts = registry.get_table("posts").unwrap();
        assert!(posts.constraints().iter().any(|c| matches!(
            c,
            Constraint::ForeignKey { references_table, .. } if references_table == "users"
        )));
    }

    #[test]
    fn test_first_schema_wins() {
        let schemas = vec!["app".to_string(), "public".to_string()];
        let columns = vec![
            col("public", "users", "legacy_id", "integer"),
            col("app", "users", "id", "uuid"),
        ];
        let registry = build_registry(&schemas, columns, Vec::new()).unwrap();
        let users = registry.get_table("users").unwrap();
        assert!(users.has_column("id"));
        assert!(!users.has_column("legacy_id"));
    }

    #[test]
    fn test_foreign_key_outside_loaded_schemas_is_skipped() {
        let columns = vec![
            col("public", "posts", "id", "integer"),
            col("public", "posts", "user_id", "integer"),
        ];
        let constraints = vec![fk("public", "posts", "user_id", ("auth", "users"))];
        let registry = build_registry(&public(), columns, constraints).unwrap();
        assert!(registry.get_table("posts").unwrap().constraints().is_empty());
    }

    #[test]
    fn test_invalid_constraint_surfaces() {
        let columns = vec![
            col("public", "users", "id", "integer"),
            col("public", "users", "email", "text"),
        ];
        let constraints = vec![pk("public", "users", &["id"]), pk("public", "users", &["email"])];
        let err = build_registry(&public(), columns, constraints).unwrap_err();
        assert!(matches!(err, PgError::Schema(SchemaError::InvalidConstraint { .. })));
    }

    #[test]
    fn test_empty_catalog() {
        let registry = build_registry(&public(), Vec::new(), Vec::new()).unwrap();
        assert!(registry.is_empty());
    }
}
