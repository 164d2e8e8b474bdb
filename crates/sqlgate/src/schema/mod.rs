//! Schema model: tables, columns, constraints and the frozen registry.
//!
//! # Example
//!
//! ```ignore
//! use sqlgate::schema::{Column, ColumnType, SchemaBuilder, Table};
//!
//! let mut builder = SchemaBuilder::new();
//! builder.register(
//!     Table::new("posts")
//!         .column(Column::new("id", ColumnType::Integer).with_default())
//!         .column(Column::new("user_id", ColumnType::Integer))
//!         .primary_key(&["id"])
//!         // forward reference, checked by freeze()
//!         .foreign_key(&["user_id"], "users", &["id"]),
//! )?;
//! builder.register(
//!     Table::new("users")
//!         .column(Column::new("id", ColumnType::Integer).with_default())
//!         .primary_key(&["id"]),
//! )?;
//! let registry = builder.freeze()?;
//! assert!(registry.resolve("posts", "user_id").is_ok());
//! ```

mod drift;
mod model;
mod registry;

#[cfg(test)]
mod tests;

pub use drift::SchemaDrift;
pub use model::{Column, ColumnType, Constraint, Table};
pub use registry::{SchemaBuilder, SchemaRegistry};
