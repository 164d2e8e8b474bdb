use super::model::{Column, Constraint, Table};
use crate::error::SchemaError;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Mutable registration phase of a schema.
///
/// Register every table (in any order, foreign keys may point forward), then
/// call [`freeze`](SchemaBuilder::freeze) to obtain a read-only [`SchemaRegistry`].
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    tables: BTreeMap<String, Table>,
}

impl SchemaBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table.
    ///
    /// Column uniqueness and the shape of each constraint are checked here;
    /// references to other columns are only checked by `freeze`.
    pub fn register(&mut self, table: Table) -> Result<(), SchemaError> {
        if self.tables.contains_key(table.name()) {
            return Err(SchemaError::DuplicateTable(table.name().to_string()));
        }

        let mut seen = HashSet::new();
        for column in table.columns() {
            if !seen.insert(column.name()) {
                return Err(SchemaError::DuplicateColumn {
                    table: table.name().to_string(),
                    column: column.name().to_string(),
                });
            }
        }

        check_constraint_shapes(&table)?;

        self.tables.insert(table.name().to_string(), table);
        Ok(())
    }

    /// Register a table, builder style.
    pub fn with_table(mut self, table: Table) -> Result<Self, SchemaError> {
        self.register(table)?;
        Ok(self)
    }

    /// Resolve a column against the tables registered so far.
    pub fn resolve(&self, table: &str, column: &str) -> Result<&Column, SchemaError> {
        resolve_in(&self.tables, table, column)
    }

    /// Number of registered tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Check if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Validate every reference and publish an immutable registry.
    pub fn freeze(self) -> Result<SchemaRegistry, SchemaError> {
        self.freeze_at(Utc::now())
    }

    /// Like [`freeze`](Self::freeze), with an explicit generation timestamp.
    pub fn freeze_at(self, generated_at: DateTime<Utc>) -> Result<SchemaRegistry, SchemaError> {
        for table in self.tables.values() {
            check_references(&self.tables, table)?;
        }

        tracing::debug!(
            target: "sqlgate.schema",
            tables = self.tables.len(),
            "schema frozen"
        );

        Ok(SchemaRegistry {
            tables: self.tables,
            generated_at,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
        })
    }
}

fn check_constraint_shapes(table: &Table) -> Result<(), SchemaError> {
    let invalid = |message: String| SchemaError::InvalidConstraint {
        table: table.name().to_string(),
        message,
    };

    let mut primary_keys = 0usize;
    for constraint in table.constraints() {
        if constraint.columns().is_empty() {
            return Err(invalid(format!(
                "{} constraint has no columns",
                constraint.kind_name()
            )));
        }

        match constraint {
            Constraint::PrimaryKey { columns } => {
                primary_keys += 1;
                if let Some(col) = columns
                    .iter()
                    .filter_map(|c| table.get_column(c))
                    .find(|c| c.is_nullable())
                {
                    return Err(invalid(format!(
                        "primary key column '{}' cannot be nullable",
                        col.name()
                    )));
                }
            }
            Constraint::ForeignKey {
                columns,
                references_columns,
                ..
            } if columns.len() != references_columns.len() => {
                return Err(invalid(format!(
                    "foreign key has {} columns but references {}",
                    columns.len(),
                    references_columns.len()
                )));
            }
            _ => {}
        }
    }

    if primary_keys > 1 {
        return Err(invalid(format!(
            "{primary_keys} primary key constraints declared, at most one allowed"
        )));
    }
    Ok(())
}

fn check_references(tables: &BTreeMap<String, Table>, table: &Table) -> Result<(), SchemaError> {
    let dangling = |message: String| SchemaError::DanglingReference {
        table: table.name().to_string(),
        message,
    };

    for constraint in table.constraints() {
        if let Some(missing) = constraint.columns().iter().find(|c| !table.has_column(c)) {
            return Err(dangling(format!(
                "{} constraint names missing column '{missing}'",
                constraint.kind_name()
            )));
        }

        if let Constraint::ForeignKey {
            references_table,
            references_columns,
            ..
        } = constraint
        {
            let Some(target) = tables.get(references_table) else {
                return Err(dangling(format!(
                    "foreign key references missing table '{references_table}'"
                )));
            };
            if let Some(missing) = references_columns.iter().find(|c| !target.has_column(c)) {
                return Err(dangling(format!(
                    "foreign key references missing column '{references_table}.{missing}'"
                )));
            }
        }
    }
    Ok(())
}

fn resolve_in<'a>(
    tables: &'a BTreeMap<String, Table>,
    table: &str,
    column: &str,
) -> Result<&'a Column, SchemaError> {
    let t = tables
        .get(table)
        .ok_or_else(|| SchemaError::UnknownTable(table.to_string()))?;
    t.get_column(column)
        .ok_or_else(|| SchemaError::UnknownColumn {
            table: table.to_string(),
            column: column.to_string(),
        })
}

/// Frozen, read-only schema.
///
/// Built once per schema source (introspection or snapshot load) and shared
/// behind an `Arc`. A reload builds a whole new registry instead of mutating
/// this one.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    tables: BTreeMap<String, Table>,
    generated_at: DateTime<Utc>,
    generation: u64,
}

impl SchemaRegistry {
    /// Look up a table by name.
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Check if a table exists.
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Resolve `table.column`.
    pub fn resolve(&self, table: &str, column: &str) -> Result<&Column, SchemaError> {
        resolve_in(&self.tables, table, column)
    }

    /// All tables, ordered by name.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// When this registry was frozen (or when its snapshot was generated).
    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// Process-unique id of this registry, assigned by `freeze`. Clones share it.
    ///
    /// Compiled statements record the generation they were checked against.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Copy the tables back into a builder, e.g. to derive a modified schema.
    pub fn into_builder(self) -> SchemaBuilder {
        SchemaBuilder {
            tables: self.tables,
        }
    }
}

/// Registries compare by their tables; `generated_at` and `generation` are metadata.
impl PartialEq for SchemaRegistry {
    fn eq(&self, other: &Self) -> bool {
        self.tables == other.tables
    }
}

impl Eq for SchemaRegistry {}
