//! Lowering of validated statements to dialect SQL.
//!
//! Compilation is pure: the same validated statement and dialect always give
//! the same SQL text and slot list. Every literal and placeholder becomes a
//! bound parameter; only identifiers and LIMIT/OFFSET numbers are inlined.

#[cfg(test)]
mod tests;

use crate::ast::{ColumnRef, JoinKind, Operand, Predicate, QueryNode};
use crate::dialect::{Dialect, DialectImpl};
use crate::error::CompileError;
use crate::schema::ColumnType;
use crate::validate::{ResolvedColumn, ValidatedStatement};
use std::collections::HashMap;

/// Where a parameter slot takes its value from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotSource {
    /// Named placeholder, looked up in the statement's [`Params`](crate::ast::Params).
    Named(String),
    /// Ordinal into the statement's literals (rendering order).
    Literal(usize),
}

/// One bound parameter of a compiled statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSlot {
    /// 1-based position.
    pub position: usize,
    pub source: SlotSource,
    /// Type of the column the value is bound against.
    pub column_type: ColumnType,
    /// The dialect's name for `column_type`.
    pub sql_type: String,
}

/// SQL text plus its ordered parameter slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledSql {
    pub dialect: Dialect,
    pub sql: String,
    pub slots: Vec<ParamSlot>,
    /// Result columns, in select-list / RETURNING order.
    pub columns: Vec<ResolvedColumn>,
    /// [`SchemaRegistry::generation`](crate::schema::SchemaRegistry::generation)
    /// the statement was validated against.
    pub schema_generation: u64,
}

impl CompiledSql {
    pub fn param_count(&self) -> usize {
        self.slots.len()
    }
}

/// Compile `stmt` for `dialect`.
pub fn compile(stmt: &ValidatedStatement, dialect: Dialect) -> Result<CompiledSql, CompileError> {
    let mut c = Compiler {
        d: dialect.implementation(),
        stmt,
        sql: String::with_capacity(128),
        slots: Vec::new(),
        named: HashMap::new(),
        literal: 0,
        qualify: false,
    };
    c.statement()?;
    Ok(CompiledSql {
        dialect,
        sql: c.sql,
        slots: c.slots,
        columns: stmt.columns().to_vec(),
        schema_generation: stmt.registry().generation(),
    })
}

struct Compiler<'a> {
    d: &'static dyn DialectImpl,
    stmt: &'a ValidatedStatement,
    sql: String,
    slots: Vec<ParamSlot>,
    /// Positions already assigned to named placeholders (numbered dialects only).
    named: HashMap<&'a str, usize>,
    /// Next literal ordinal.
    literal: usize,
    /// Qualify column names with their table.
    qualify: bool,
}

impl<'a> Compiler<'a> {
    fn unsupported(&self, construct: &'static str) -> CompileError {
        CompileError::UnsupportedConstruct {
            dialect: self.d.dialect(),
            construct,
        }
    }

    fn ident(&mut self, name: &str) {
        let quoted = self.d.quote_ident(name);
        self.sql.push_str(&quoted);
    }

    fn column(&mut self, table: &str, column: &str) {
        if self.qualify {
            self.ident(table);
            self.sql.push('.');
        }
        self.ident(column);
    }

    fn column_ref(&mut self, c: &ColumnRef) {
        self.column(c.table(), c.column());
    }

    fn column_type(&self, c: &ColumnRef) -> ColumnType {
        // resolved during validation
        self.stmt
            .registry()
            .resolve(c.table(), c.column())
            .map(|col| col.column_type().clone())
            .unwrap_or_else(|_| ColumnType::custom("unknown"))
    }

    fn push_slot(&mut self, source: SlotSource, against: &ColumnRef) -> usize {
        let column_type = self.column_type(against);
        let position = self.slots.len() + 1;
        self.slots.push(ParamSlot {
            position,
            source,
            sql_type: self.d.type_name(&column_type),
            column_type,
        });
        position
    }

    /// Render an operand bound against column `against`.
    fn operand(&mut self, operand: &'a Operand, against: &ColumnRef) {
        let position = match operand {
            Operand::Column(c) => {
                self.column_ref(c);
                return;
            }
            Operand::Placeholder(name) if self.d.numbered_placeholders() => {
                match self.named.get(name.as_str()) {
                    Some(&p) => p,
                    None => {
                        let p = self.push_slot(SlotSource::Named(name.clone()), against);
                        self.named.insert(name, p);
                        p
                    }
                }
            }
            Operand::Placeholder(name) => self.push_slot(SlotSource::Named(name.clone()), against),
            Operand::Literal(_) => {
                let ordinal = self.literal;
                self.literal += 1;
                self.push_slot(SlotSource::Literal(ordinal), against)
            }
        };
        let placeholder = self.d.placeholder(position);
        self.sql.push_str(&placeholder);
    }

    fn predicate(&mut self, p: &'a Predicate) -> Result<(), CompileError> {
        match p {
            Predicate::Comparison {
                column,
                op,
                operand,
            } => {
                self.column_ref(column);
                self.sql.push(' ');
                self.sql.push_str(op.as_sql());
                self.sql.push(' ');
                self.operand(operand, column);
            }
            Predicate::And(parts) | Predicate::Or(parts) => {
                let is_and = matches!(p, Predicate::And(_));
                match parts.as_slice() {
                    [] => self.sql.push_str(if is_and { "1=1" } else { "1=0" }),
                    [only] => self.nested(only)?,
                    _ => {
                        for (i, part) in parts.iter().enumerate() {
                            if i > 0 {
                                self.sql.push_str(if is_and { " AND " } else { " OR " });
                            }
                            self.nested(part)?;
                        }
                    }
                }
            }
            Predicate::Not(inner) => {
                self.sql.push_str("NOT (");
                self.predicate(inner)?;
                self.sql.push(')');
            }
            Predicate::Like {
                column,
                pattern,
                escape,
                case_insensitive,
                negated,
            } => {
                if *case_insensitive && !self.d.supports_ilike() {
                    return Err(self.unsupported("ILIKE"));
                }
                self.column_ref(column);
                if *negated {
                    self.sql.push_str(" NOT");
                }
                self.sql
                    .push_str(if *case_insensitive { " ILIKE " } else { " LIKE " });
                self.operand(pattern, column);
                if let Some(ch) = escape {
                    let literal = self.d.string_literal(ch.encode_utf8(&mut [0; 4]));
                    self.sql.push_str(" ESCAPE ");
                    self.sql.push_str(&literal);
                }
            }
            Predicate::In {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    self.sql.push_str(if *negated { "1=1" } else { "1=0" });
                    return Ok(());
                }
                self.column_ref(column);
                self.sql
                    .push_str(if *negated { " NOT IN (" } else { " IN (" });
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        self.sql.push_str(", ");
                    }
                    self.operand(v, column);
                }
                self.sql.push(')');
            }
            Predicate::IsNull { column, negated } => {
                self.column_ref(column);
                self.sql.push_str(if *negated {
                    " IS NOT NULL"
                } else {
                    " IS NULL"
                });
            }
        }
        Ok(())
    }

    /// Render a predicate as an operand of AND/OR/NOT, parenthesized if compound.
    fn nested(&mut self, p: &'a Predicate) -> Result<(), CompileError> {
        let compound = match p {
            Predicate::And(parts) | Predicate::Or(parts) => parts.len() > 1,
            Predicate::Not(_) => true,
            _ => false,
        };
        if compound {
            self.sql.push('(');
            self.predicate(p)?;
            self.sql.push(')');
            Ok(())
        } else {
            self.predicate(p)
        }
    }

    fn where_clause(&mut self, p: Option<&'a Predicate>) -> Result<(), CompileError> {
        if let Some(p) = p {
            self.sql.push_str(" WHERE ");
            self.predicate(p)?;
        }
        Ok(())
    }

    fn returning(&mut self, columns: &[ColumnRef]) -> Result<(), CompileError> {
        if columns.is_empty() {
            return Ok(());
        }
        if !self.d.supports_returning() {
            return Err(self.unsupported("RETURNING"));
        }
        self.sql.push_str(" RETURNING ");
        for (i, c) in columns.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.column_ref(c);
        }
        Ok(())
    }

    fn statement(&mut self) -> Result<(), CompileError> {
        let stmt = self.stmt;
        match stmt.node() {
            QueryNode::Select(s) => {
                self.qualify = !s.joins().is_empty();
                self.sql.push_str("SELECT ");
                for (i, c) in stmt.columns().iter().enumerate() {
                    if i > 0 {
                        self.sql.push_str(", ");
                    }
                    self.column(&c.table, &c.name);
                }
                self.sql.push_str(" FROM ");
                self.ident(s.table().name());
                for join in s.joins() {
                    if join.kind == JoinKind::Full && !self.d.supports_full_join() {
                        return Err(self.unsupported("FULL JOIN"));
                    }
                    self.sql.push(' ');
                    self.sql.push_str(join.kind.as_sql());
                    self.sql.push(' ');
                    self.ident(join.table.name());
                    self.sql.push_str(" ON ");
                    self.predicate(&join.on)?;
                }
                self.where_clause(s.predicate())?;
                if !s.order_by.is_empty() {
                    self.sql.push_str(" ORDER BY ");
                    for (i, o) in s.order_by.iter().enumerate() {
                        if i > 0 {
                            self.sql.push_str(", ");
                        }
                        self.column_ref(&o.column);
                        self.sql.push(' ');
                        self.sql.push_str(o.direction.as_sql());
                    }
                }
                match (s.limit, s.offset) {
                    (Some(limit), _) => self.sql.push_str(&format!(" LIMIT {limit}")),
                    (None, Some(_)) => {
                        if let Some(all) = self.d.limit_for_offset_only() {
                            self.sql.push_str(&format!(" LIMIT {all}"));
                        }
                    }
                    (None, None) => {}
                }
                if let Some(offset) = s.offset {
                    self.sql.push_str(&format!(" OFFSET {offset}"));
                }
            }
            QueryNode::Insert(i) => {
                self.sql.push_str("INSERT INTO ");
                self.ident(i.table().name());
                let columns = i.column_names();
                self.sql.push_str(" (");
                for (n, c) in columns.iter().enumerate() {
                    if n > 0 {
                        self.sql.push_str(", ");
                    }
                    self.ident(c);
                }
                self.sql.push_str(") VALUES ");
                for row in 0..i.rows().len() {
                    if row > 0 {
                        self.sql.push_str(", ");
                    }
                    self.sql.push('(');
                    for (n, c) in columns.iter().enumerate() {
                        if n > 0 {
                            self.sql.push_str(", ");
                        }
                        if let Some(o) = i.operand(row, c) {
                            self.operand(o, &i.table().col(*c));
                        }
                    }
                    self.sql.push(')');
                }
                self.returning(&i.returning)?;
            }
            QueryNode::Update(u) => {
                self.sql.push_str("UPDATE ");
                self.ident(u.table().name());
                self.sql.push_str(" SET ");
                for (n, (c, o)) in u.assignments().iter().enumerate() {
                    if n > 0 {
                        self.sql.push_str(", ");
                    }
                    self.ident(c);
                    self.sql.push_str(" = ");
                    self.operand(o, &u.table().col(c));
                }
                self.where_clause(u.predicate.as_ref())?;
                self.returning(&u.returning)?;
            }
            QueryNode::Delete(d) => {
                self.sql.push_str("DELETE FROM ");
                self.ident(d.table().name());
                self.where_clause(d.predicate.as_ref())?;
                self.returning(&d.returning)?;
            }
        }
        Ok(())
    }
}
