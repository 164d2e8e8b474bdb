use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical column type.
///
/// The closed set covers what every supported backend can store; anything
/// else goes through [`ColumnType::Custom`], which only accepts values tagged
/// with the same type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Boolean,
    Timestamp,
    Binary,
    Json,
    Uuid,
    /// Registered-type escape, written as `custom:<name>`.
    Custom(String),
}

impl ColumnType {
    /// Create a custom (registered) type.
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    /// Whether `<`, `<=`, `>`, `>=` are meaningful on this type.
    pub fn is_ordered(&self) -> bool {
        !matches!(self, Self::Boolean | Self::Binary | Self::Json)
    }

    /// Whether this type is one of the numeric types.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }

    /// Map a backend type name (as reported by a catalog) to a logical type.
    ///
    /// Length/precision modifiers are ignored (`varchar(255)` is text). Names
    /// outside the closed set become [`ColumnType::Custom`].
    pub fn from_sql_type(sql_type: &str) -> Self {
        let lowered = sql_type.trim().to_ascii_lowercase();
        let base = lowered
            .split('(')
            .next()
            .unwrap_or_default()
            .trim()
            .trim_end_matches("[]");

        match base {
            "int" | "integer" | "int2" | "int4" | "int8" | "smallint" | "bigint" | "serial"
            | "bigserial" | "smallserial" | "mediumint" => Self::Integer,
            "real" | "float" | "float4" | "float8" | "double" | "double precision" => Self::Float,
            "text" | "varchar" | "character varying" | "char" | "character" | "bpchar"
            | "longtext" | "mediumtext" | "tinytext" | "name" => Self::Text,
            "bool" | "boolean" => Self::Boolean,
            "timestamp"
            | "timestamptz"
            | "timestamp without time zone"
            | "timestamp with time zone"
            | "datetime" => Self::Timestamp,
            "bytea" | "blob" | "longblob" | "mediumblob" | "binary" | "varbinary" => Self::Binary,
            "json" | "jsonb" => Self::Json,
            "uuid" => Self::Uuid,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => f.write_str("integer"),
            Self::Float => f.write_str("float"),
            Self::Text => f.write_str("text"),
            Self::Boolean => f.write_str("boolean"),
            Self::Timestamp => f.write_str("timestamp"),
            Self::Binary => f.write_str("binary"),
            Self::Json => f.write_str("json"),
            Self::Uuid => f.write_str("uuid"),
            Self::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "integer" => Ok(Self::Integer),
            "float" => Ok(Self::Float),
            "text" => Ok(Self::Text),
            "boolean" => Ok(Self::Boolean),
            "timestamp" => Ok(Self::Timestamp),
            "binary" => Ok(Self::Binary),
            "json" => Ok(Self::Json),
            "uuid" => Ok(Self::Uuid),
            other => match other.strip_prefix("custom:") {
                Some(name) if !name.is_empty() => Ok(Self::Custom(name.to_string())),
                _ => Err(format!("unknown column type '{other}'")),
            },
        }
    }
}

impl From<ColumnType> for String {
    fn from(ty: ColumnType) -> Self {
        ty.to_string()
    }
}

impl TryFrom<String> for ColumnType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A column declaration.
///
/// Columns are NOT NULL without a default unless stated otherwise. The type
/// cannot be changed once the column exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    #[serde(rename = "type")]
    ty: ColumnType,
    nullable: bool,
    has_default: bool,
}

impl Column {
    /// Create a NOT NULL column without a default.
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: false,
            has_default: false,
        }
    }

    /// Allow NULL values.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark the column as having a server-side default (serial, `DEFAULT now()`, ...).
    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> &ColumnType {
        &self.ty
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn has_default(&self) -> bool {
        self.has_default
    }
}

/// A table-level constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    PrimaryKey {
        columns: Vec<String>,
    },
    Unique {
        columns: Vec<String>,
    },
    ForeignKey {
        columns: Vec<String>,
        references_table: String,
        references_columns: Vec<String>,
    },
}

impl Constraint {
    /// Columns of the owning table this constraint covers.
    pub fn columns(&self) -> &[String] {
        match self {
            Self::PrimaryKey { columns }
            | Self::Unique { columns }
            | Self::ForeignKey { columns, .. } => columns,
        }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Self::PrimaryKey { .. } => "primary key",
            Self::Unique { .. } => "unique",
            Self::ForeignKey { .. } => "foreign key",
        }
    }
}

fn owned(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}

/// A table declaration: ordered columns plus constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    name: String,
    columns: Vec<Column>,
    #[serde(default)]
    constraints: Vec<Constraint>,
}

impl Table {
    /// Create an empty table declaration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Append a column.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Declare the (possibly composite) primary key.
    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.constraints.push(Constraint::PrimaryKey {
            columns: owned(columns),
        });
        self
    }

    /// Declare a unique constraint.
    pub fn unique(mut self, columns: &[&str]) -> Self {
        self.constraints.push(Constraint::Unique {
            columns: owned(columns),
        });
        self
    }

    /// Declare a foreign key. The target may be registered later.
    pub fn foreign_key(mut self, columns: &[&str], table: &str, references: &[&str]) -> Self {
        self.constraints.push(Constraint::ForeignKey {
            columns: owned(columns),
            references_table: table.to_string(),
            references_columns: owned(references),
        });
        self
    }

    /// Append an already-built constraint.
    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Look up a column by name.
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Check if this table has a column with the given name.
    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    /// Primary key columns, if a primary key is declared.
    pub fn primary_key_columns(&self) -> Option<&[String]> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::PrimaryKey { columns } => Some(columns.as_slice()),
            _ => None,
        })
    }
}
