//! Static validation of statements against a schema.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 0. statement shape (empty INSERT, ragged rows, UPDATE without SET,
//!    DELETE without WHERE, `LIMIT 0`)
//! 1. referenced tables exist
//! 2. referenced columns exist and their table is in scope
//! 3. literal/bound value types and column-vs-column comparisons
//! 4. every placeholder bound exactly once, no unused bindings
//! 5. NULL against non-nullable columns

mod coercion;


use crate::ast::{
    Clause, ColumnRef, CompareOp, Fingerprint, JoinKind, Operand, Params, Predicate, QueryNode,
    Value,
};
use crate::compile::{ParamSlot, SlotSource};
use crate::dialect::Dialect;
use crate::error::{CompileError, GateResult, SchemaError, ValidationError};
use crate::schema::{Column, ColumnType, SchemaRegistry};
use crate::source::SchemaSource;
use coercion::{columns_compatible, value_mismatch};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// A column of a statement's result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub table: String,
    pub name: String,
    pub column_type: ColumnType,
    /// Nullable in the result: declared nullable, or on the optional side of an outer join.
    pub nullable: bool,
}

/// A statement that passed validation, together with the registry it was
/// checked against.
#[derive(Debug, Clone)]
pub struct ValidatedStatement {
    node: QueryNode,
    registry: Arc<SchemaRegistry>,
    params: Params,
    literals: Vec<Value>,
    columns: Vec<ResolvedColumn>,
}

impl ValidatedStatement {
    pub fn node(&self) -> &QueryNode {
        &self.node
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Literal values in rendering order.
    pub fn literals(&self) -> &[Value] {
        &self.literals
    }

    /// Result columns: the expanded projection for SELECT, RETURNING otherwise.
    pub fn columns(&self) -> &[ResolvedColumn] {
        &self.columns
    }

    pub fn fingerprint(&self, dialect: Dialect) -> Fingerprint {
        Fingerprint::of(&self.node, dialect)
    }

    /// Ordered argument list for the given parameter slots.
    ///
    /// The slots may come from a cached compilation of another statement with
    /// the same fingerprint; values are taken from this statement.
    pub fn arguments(&self, slots: &[ParamSlot]) -> Result<Vec<Value>, CompileError> {
        slots
            .iter()
            .map(|slot| {
                let value = match &slot.source {
                    SlotSource::Named(name) => self.params.get(name),
                    SlotSource::Literal(i) => self.literals.get(*i),
                };
                value
                    .cloned()
                    .ok_or(CompileError::MissingArgument(slot.position))
            })
            .collect()
    }
}

/// Validate `node` against the registry currently published by `source`.
pub fn validate(
    node: QueryNode,
    source: &SchemaSource,
    params: Params,
) -> GateResult<ValidatedStatement> {
    validate_against(node, source.registry(), params)
}

/// Validate `node` against an explicit registry.
pub fn validate_against(
    node: QueryNode,
    registry: Arc<SchemaRegistry>,
    params: Params,
) -> GateResult<ValidatedStatement> {
    let columns = Validator::new(&node, &registry, &params).run()?;
    let literals = node.literals();
    Ok(ValidatedStatement {
        node,
        registry,
        params,
        literals,
        columns,
    })
}

/// A position where an operand is bound against a column.
enum Check<'a> {
    Operand {
        clause: Clause,
        column: ColumnRef,
        operand: &'a Operand,
    },
    Ordering {
        clause: Clause,
        column: &'a ColumnRef,
        op: CompareOp,
    },
    Like {
        clause: Clause,
        column: &'a ColumnRef,
    },
}

struct Validator<'a> {
    node: &'a QueryNode,
    registry: &'a SchemaRegistry,
    params: &'a Params,
    scope: Vec<&'a str>,
}

impl<'a> Validator<'a> {
    fn new(node: &'a QueryNode, registry: &'a SchemaRegistry, params: &'a Params) -> Self {
        let mut scope = vec![node.table().name()];
        if let QueryNode::Select(s) = node {
            scope.extend(s.joins().iter().map(|j| j.table.name()));
        }
        Self {
            node,
            registry,
            params,
            scope,
        }
    }

    fn run(&self) -> GateResult<Vec<ResolvedColumn>> {
        self.check_shape()?;
        let referenced = self.referenced_columns();
        self.check_tables(&referenced)?;
        for (_, column) in &referenced {
            self.column(column)?;
        }
        let checks = self.checks();
        self.check_types(&checks)?;
        self.check_arity()?;
        self.check_nullability(&checks)?;
        self.output_columns()
    }

    fn column(&self, c: &ColumnRef) -> Result<&'a Column, SchemaError> {
        if !self.scope.iter().any(|t| *t == c.table()) {
            return Err(SchemaError::UnknownColumn {
                table: c.table().to_string(),
                column: c.column().to_string(),
            });
        }
        self.registry.resolve(c.table(), c.column())
    }

    fn check_shape(&self) -> Result<(), ValidationError> {
        let malformed = |clause, message: String| ValidationError::MalformedStatement {
            clause,
            message,
        };

        match self.node {
            QueryNode::Select(s) => {
                if s.limit == Some(0) {
                    return Err(malformed(Clause::Limit, "LIMIT must be positive".into()));
                }
                // bigint on the server side
                for (name, n) in [("LIMIT", s.limit), ("OFFSET", s.offset)] {
                    if n.is_some_and(|n| i64::try_from(n).is_err()) {
                        return Err(malformed(
                            Clause::Limit,
                            format!("{name} exceeds {}", i64::MAX),
                        ));
                    }
                }
                // no table aliases: each table may appear once
                let mut tables = HashSet::new();
                if let Some(t) = self.scope.iter().find(|t| !tables.insert(**t)) {
                    return Err(malformed(
                        Clause::Join,
                        format!("table '{t}' is already in scope"),
                    ));
                }
            }
            QueryNode::Insert(i) => {
                let Some(first) = i.rows().first().filter(|r| !r.is_empty()) else {
                    return Err(malformed(Clause::Values, "INSERT has no values".into()));
                };
                let expected: BTreeSet<&str> = first.iter().map(|(c, _)| c.as_str()).collect();
                for (n, row) in i.rows().iter().enumerate() {
                    let names: BTreeSet<&str> = row.iter().map(|(c, _)| c.as_str()).collect();
                    if names.len() != row.len() {
                        return Err(malformed(
                            Clause::Values,
                            format!("row {n} sets a column more than once"),
                        ));
                    }
                    if names != expected {
                        return Err(malformed(
                            Clause::Values,
                            format!("row {n} sets {names:?}, expected {expected:?}"),
                        ));
                    }
                    if let Some((c, _)) = row.iter().find(|(_, o)| matches!(o, Operand::Column(_))) {
                        return Err(malformed(
                            Clause::Values,
                            format!("value for '{c}' cannot reference a column"),
                        ));
                    }
                }
            }
            QueryNode::Update(u) => {
                if u.assignments().is_empty() {
                    return Err(malformed(
                        Clause::Set,
                        "UPDATE requires at least one assignment".into(),
                    ));
                }
                let mut seen = HashSet::new();
                if let Some((c, _)) = u.assignments().iter().find(|(c, _)| !seen.insert(c)) {
                    return Err(malformed(Clause::Set, format!("'{c}' assigned more than once")));
                }
            }
            QueryNode::Delete(d) => {
                if d.predicate.is_none() && !d.allow_all {
                    return Err(malformed(
                        Clause::Where,
                        "DELETE without WHERE requires allow_delete_all".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_tables(&self, referenced: &[(Clause, ColumnRef)]) -> Result<(), SchemaError> {
        for table in &self.scope {
            if !self.registry.has_table(table) {
                return Err(SchemaError::UnknownTable(table.to_string()));
            }
        }
        for (_, column) in referenced {
            if !self.registry.has_table(column.table()) {
                return Err(SchemaError::UnknownTable(column.table().to_string()));
            }
        }
        Ok(())
    }

    /// Every column the statement mentions, in clause order.
    fn referenced_columns(&self) -> Vec<(Clause, ColumnRef)> {
        fn from_predicate(clause: Clause, p: &Predicate, out: &mut Vec<(Clause, ColumnRef)>) {
            p.walk_columns(&mut |c| out.push((clause, c.clone())));
        }

        let mut out = Vec::new();
        let table = self.node.table();

        match self.node {
            QueryNode::Select(s) => {
                out.extend(s.projection.iter().map(|c| (Clause::Projection, c.clone())));
                for join in s.joins() {
                    from_predicate(Clause::Join, &join.on, &mut out);
                }
                if let Some(p) = s.predicate() {
                    from_predicate(Clause::Where, p, &mut out);
                }
                out.extend(s.order_by.iter().map(|o| (Clause::OrderBy, o.column.clone())));
            }
            QueryNode::Insert(i) => {
                for row in i.rows() {
                    out.extend(row.iter().map(|(c, _)| (Clause::Values, table.col(c))));
                }
            }
            QueryNode::Update(u) => {
                for (c, o) in u.assignments() {
                    out.push((Clause::Set, table.col(c)));
                    if let Operand::Column(other) = o {
                        out.push((Clause::Set, other.clone()));
                    }
                }
                if let Some(p) = &u.predicate {
                    from_predicate(Clause::Where, p, &mut out);
                }
            }
            QueryNode::Delete(d) => {
                if let Some(p) = &d.predicate {
                    from_predicate(Clause::Where, p, &mut out);
                }
            }
        }
        out.extend(
            self.node
                .returning()
                .iter()
                .map(|c| (Clause::Returning, c.clone())),
        );
        out
    }

    /// Operand bindings and operator applicability checks, in clause order.
    fn checks(&self) -> Vec<Check<'a>> {
        fn from_predicate<'a>(clause: Clause, p: &'a Predicate, out: &mut Vec<Check<'a>>) {
            match p {
                Predicate::Comparison {
                    column,
                    op,
                    operand,
                } => {
                    if op.is_ordering() {
                        out.push(Check::Ordering {
                            clause,
                            column,
                            op: *op,
                        });
                    }
                    out.push(Check::Operand {
                        clause,
                        column: column.clone(),
                        operand,
                    });
                }
                Predicate::And(parts) | Predicate::Or(parts) => {
                    for part in parts {
                        from_predicate(clause, part, out);
                    }
                }
                Predicate::Not(inner) => from_predicate(clause, inner, out),
                Predicate::Like {
                    column, pattern, ..
                } => {
                    out.push(Check::Like { clause, column });
                    out.push(Check::Operand {
                        clause,
                        column: column.clone(),
                        operand: pattern,
                    });
                }
                Predicate::In { column, values, .. } => {
                    for operand in values {
                        out.push(Check::Operand {
                            clause,
                            column: column.clone(),
                            operand,
                        });
                    }
                }
                Predicate::IsNull { .. } => {}
            }
        }

        let mut out = Vec::new();
        let table = self.node.table();
        match self.node {
            QueryNode::Select(s) => {
                for join in s.joins() {
                    from_predicate(Clause::Join, &join.on, &mut out);
                }
                if let Some(p) = s.predicate() {
                    from_predicate(Clause::Where, p, &mut out);
                }
            }
            QueryNode::Insert(i) => {
                for row in i.rows() {
                    for (c, operand) in row {
                        out.push(Check::Operand {
                            clause: Clause::Values,
                            column: table.col(c),
                            operand,
                        });
                    }
                }
            }
            QueryNode::Update(u) => {
                for (c, operand) in u.assignments() {
                    out.push(Check::Operand {
                        clause: Clause::Set,
                        column: table.col(c),
                        operand,
                    });
                }
                if let Some(p) = &u.predicate {
                    from_predicate(Clause::Where, p, &mut out);
                }
            }
            QueryNode::Delete(d) => {
                if let Some(p) = &d.predicate {
                    from_predicate(Clause::Where, p, &mut out);
                }
            }
        }
        out
    }

    fn check_types(&self, checks: &[Check<'a>]) -> GateResult<()> {
        let mismatch = |clause: Clause, c: &ColumnRef, expected: &ColumnType, found: String| {
            ValidationError::TypeMismatch {
                clause,
                table: c.table().to_string(),
                column: c.column().to_string(),
                expected: expected.clone(),
                found,
            }
        };

        for check in checks {
            match check {
                Check::Ordering { clause, column, op } => {
                    let ty = self.column(column)?.column_type();
                    if !ty.is_ordered() {
                        return Err(
                            mismatch(*clause, column, ty, format!("operator {}", op.as_sql()))
                                .into(),
                        );
                    }
                }
                Check::Like { clause, column } => {
                    let ty = self.column(column)?.column_type();
                    if *ty != ColumnType::Text {
                        return Err(mismatch(*clause, column, ty, "operator LIKE".into()).into());
                    }
                }
                Check::Operand {
                    clause,
                    column,
                    operand,
                } => {
                    let ty = self.column(column)?.column_type();
                    let found = match operand {
                        Operand::Literal(v) => value_mismatch(ty, v),
                        Operand::Placeholder(name) => {
                            self.params.get(name).and_then(|v| value_mismatch(ty, v))
                        }
                        Operand::Column(other) => {
                            let other_ty = self.column(other)?.column_type();
                            (!columns_compatible(ty, other_ty))
                                .then(|| format!("column {other} ({other_ty})"))
                        }
                    };
                    if let Some(found) = found {
                        return Err(mismatch(*clause, column, ty, found).into());
                    }
                }
            }
        }
        Ok(())
    }

    fn check_arity(&self) -> Result<(), ValidationError> {
        let mut placeholders: Vec<&str> = Vec::new();
        self.node.for_each_operand(|_, o| {
            if let Operand::Placeholder(name) = o {
                if !placeholders.contains(&name.as_str()) {
                    placeholders.push(name);
                }
            }
        });

        let arity = |message: String| ValidationError::ParameterArityMismatch {
            expected: placeholders.len(),
            supplied: self.params.len(),
            message,
        };

        for name in &placeholders {
            match self.params.iter().filter(|(n, _)| n == name).count() {
                0 => return Err(arity(format!("no value bound for ':{name}'"))),
                1 => {}
                _ => return Err(arity(format!("':{name}' bound more than once"))),
            }
        }
        if let Some((unused, _)) = self
            .params
            .iter()
            .find(|(n, _)| !placeholders.contains(n))
        {
            return Err(arity(format!("binding '{unused}' matches no placeholder")));
        }
        Ok(())
    }

    fn check_nullability(&self, checks: &[Check<'a>]) -> GateResult<()> {
        for check in checks {
            let Check::Operand {
                clause,
                column,
                operand,
            } = check
            else {
                continue;
            };
            let is_null = match operand {
                Operand::Literal(v) => v.is_null(),
                Operand::Placeholder(name) => self.params.get(name).is_some_and(Value::is_null),
                Operand::Column(_) => false,
            };
            if is_null && !self.column(column)?.is_nullable() {
                return Err(ValidationError::NullabilityViolation {
                    clause: *clause,
                    table: column.table().to_string(),
                    column: column.column().to_string(),
                }
                .into());
            }
        }

        if let QueryNode::Insert(i) = self.node {
            let table = self.node.table().name();
            let set = i.column_names();
            let target = self
                .registry
                .get_table(table)
                .ok_or_else(|| SchemaError::UnknownTable(table.to_string()))?;
            if let Some(missing) = target
                .columns()
                .iter()
                .find(|c| !c.is_nullable() && !c.has_default() && !set.contains(&c.name()))
            {
                return Err(ValidationError::NullabilityViolation {
                    clause: Clause::Values,
                    table: table.to_string(),
                    column: missing.name().to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn output_columns(&self) -> GateResult<Vec<ResolvedColumn>> {
        let resolved = |c: &ColumnRef, optional: bool| -> Result<ResolvedColumn, SchemaError> {
            let col = self.column(c)?;
            Ok(ResolvedColumn {
                table: c.table().to_string(),
                name: c.column().to_string(),
                column_type: col.column_type().clone(),
                nullable: col.is_nullable() || optional,
            })
        };

        let QueryNode::Select(s) = self.node else {
            return Ok(self
                .node
                .returning()
                .iter()
                .map(|c| resolved(c, false))
                .collect::<Result<Vec<_>, SchemaError>>()?);
        };

        // tables on the optional side of an outer join produce nullable columns
        let mut optional: HashSet<&str> = HashSet::new();
        let mut seen = vec![s.table().name()];
        for join in s.joins() {
            let name = join.table.name();
            if matches!(join.kind, JoinKind::Right | JoinKind::Full) {
                optional.extend(seen.iter().copied());
            }
            if matches!(join.kind, JoinKind::Left | JoinKind::Full) {
                optional.insert(name);
            }
            seen.push(name);
        }

        let projection: Vec<ColumnRef> = if s.projection.is_empty() {
            let mut all = Vec::new();
            for table in &self.scope {
                let t = self
                    .registry
                    .get_table(table)
                    .ok_or_else(|| SchemaError::UnknownTable(table.to_string()))?;
                all.extend(t.columns().iter().map(|c| ColumnRef::new(*table, c.name())));
            }
            all
        } else {
            s.projection.clone()
        };

        Ok(projection
            .iter()
            .map(|c| resolved(c, optional.contains(c.table())))
            .collect::<Result<Vec<_>, SchemaError>>()?)
    }
}
