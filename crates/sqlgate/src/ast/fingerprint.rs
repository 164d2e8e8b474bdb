use super::expr::{ColumnRef, Operand, Predicate};
use super::statement::QueryNode;
use crate::dialect::Dialect;
use std::fmt::{self, Write as _};
use std::hash::{DefaultHasher, Hash, Hasher};

/// Structural digest of a statement, used as the statement cache key.
///
/// Two statements share a fingerprint when they differ only in literal
/// values. Table and column names, operators, predicate shape, placeholder
/// names, literal positions, LIMIT/OFFSET and the dialect all contribute.
///
/// The digest is only meaningful within one build of the process; it is not
/// meant to be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u128);

impl Fingerprint {
    /// Fingerprint `node` compiled for `dialect`.
    pub fn of(node: &QueryNode, dialect: Dialect) -> Self {
        let shape = canonical_shape(node);
        let half = |salt: u8| {
            let mut h = DefaultHasher::new();
            salt.hash(&mut h);
            dialect.hash(&mut h);
            shape.hash(&mut h);
            h.finish()
        };
        Self((u128::from(half(0x5a)) << 64) | u128::from(half(0xa5)))
    }

    pub fn as_u128(self) -> u128 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Canonical text rendering of a statement's shape, with literals erased.
pub(crate) fn canonical_shape(node: &QueryNode) -> String {
    let mut out = String::with_capacity(128);
    // Writing into a String never fails.
    let _ = write_node(&mut out, node);
    out
}

fn write_node(out: &mut String, node: &QueryNode) -> fmt::Result {
    write!(out, "{}|t={:?}", node.kind(), node.table().name())?;
    match node {
        QueryNode::Select(s) => {
            out.push_str("|p=[");
            for c in &s.projection {
                write_column(out, c)?;
                out.push(',');
            }
            out.push_str("]|j=[");
            for j in &s.joins {
                write!(out, "{}:{:?}:", j.kind.as_sql(), j.table.name())?;
                write_predicate(out, &j.on)?;
                out.push(',');
            }
            out.push_str("]|w=");
            write_opt_predicate(out, s.predicate.as_ref())?;
            out.push_str("|o=[");
            for o in &s.order_by {
                write_column(out, &o.column)?;
                write!(out, " {},", o.direction.as_sql())?;
            }
            write!(out, "]|l={:?}|f={:?}", s.limit, s.offset)?;
        }
        QueryNode::Insert(i) => {
            let columns = i.column_names();
            write!(out, "|c={columns:?}|r=[")?;
            for row in 0..i.rows.len() {
                out.push('(');
                for column in &columns {
                    match i.operand(row, column) {
                        Some(o) => write_operand(out, o)?,
                        None => out.push('_'),
                    }
                    out.push(',');
                }
                // ragged rows must not collide with regular ones
                write!(out, "#{})", i.rows[row].len())?;
            }
            out.push(']');
        }
        QueryNode::Update(u) => {
            out.push_str("|s=[");
            for (column, o) in &u.assignments {
                write!(out, "{column:?}=")?;
                write_operand(out, o)?;
                out.push(',');
            }
            out.push_str("]|w=");
            write_opt_predicate(out, u.predicate.as_ref())?;
        }
        QueryNode::Delete(d) => {
            out.push_str("|w=");
            write_opt_predicate(out, d.predicate.as_ref())?;
            write!(out, "|all={}", d.allow_all)?;
        }
    }
    out.push_str("|ret=[");
    for c in node.returning() {
        write_column(out, c)?;
        out.push(',');
    }
    out.push(']');
    Ok(())
}

fn write_column(out: &mut String, c: &ColumnRef) -> fmt::Result {
    write!(out, "{:?}.{:?}", c.table(), c.column())
}

fn write_operand(out: &mut String, o: &Operand) -> fmt::Result {
    match o {
        Operand::Column(c) => {
            out.push_str("c:");
            write_column(out, c)
        }
        Operand::Placeholder(name) => write!(out, ":{name:?}"),
        Operand::Literal(_) => {
            out.push('?');
            Ok(())
        }
    }
}

fn write_opt_predicate(out: &mut String, p: Option<&Predicate>) -> fmt::Result {
    match p {
        Some(p) => write_predicate(out, p),
        None => {
            out.push('-');
            Ok(())
        }
    }
}

fn write_predicate(out: &mut String, p: &Predicate) -> fmt::Result {
    match p {
        Predicate::Comparison {
            column,
            op,
            operand,
        } => {
            out.push_str("cmp(");
            write_column(out, column)?;
            write!(out, " {} ", op.as_sql())?;
            write_operand(out, operand)?;
            out.push(')');
        }
        Predicate::And(parts) | Predicate::Or(parts) => {
            out.push_str(if matches!(p, Predicate::And(_)) {
                "and["
            } else {
                "or["
            });
            for part in parts {
                write_predicate(out, part)?;
                out.push(',');
            }
            out.push(']');
        }
        Predicate::Not(inner) => {
            out.push_str("not(");
            write_predicate(out, inner)?;
            out.push(')');
        }
        Predicate::Like {
            column,
            pattern,
            escape,
            case_insensitive,
            negated,
        } => {
            out.push_str("like(");
            write_column(out, column)?;
            out.push(',');
            write_operand(out, pattern)?;
            write!(out, ",{escape:?},{case_insensitive},{negated})")?;
        }
        Predicate::In {
            column,
            values,
            negated,
        } => {
            out.push_str("in(");
            write_column(out, column)?;
            write!(out, ",{negated},[")?;
            for v in values {
                write_operand(out, v)?;
                out.push(',');
            }
            out.push_str("])");
        }
        Predicate::IsNull { column, negated } => {
            out.push_str("null(");
            write_column(out, column)?;
            write!(out, ",{negated})")?;
        }
    }
    Ok(())
}
