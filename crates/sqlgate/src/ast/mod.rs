//! Immutable query representation.
//!
//! Statements are built with consuming builder methods; every method returns
//! a new node, so a finished subtree never changes. Column references are
//! plain names until [`Statement::build`] resolves them against a schema.
//!
//! ```ignore
//! use sqlgate::ast::{param, select, Params, Statement, TableRef};
//!
//! let users = TableRef::new("users");
//! let stmt = select(&users)
//!     .columns([users.col("id"), users.col("email")])
//!     .filter(users.col("email").eq(param("email")))
//!     .limit(1)
//!     .build(&source, Params::new().bind("email", "a@b.com"))?;
//! ```

mod expr;
mod fingerprint;
mod statement;
mod value;


pub use expr::{ColumnRef, CompareOp, Operand, Predicate, TableRef, and, lit, not, or, param};
pub use fingerprint::Fingerprint;
pub use statement::{
    Clause, Delete, Direction, Insert, InsertRow, Join, JoinKind, OrderBy, Params, QueryNode,
    Select, Statement, Update, delete, insert, select, update,
};
pub use value::Value;
