use crate::ast::Value;
use crate::schema::ColumnType;

/// Whether a non-null `value` may be bound against a column of type `ty`.
///
/// Fail-closed: only the pairs listed here are accepted. Integers widen to
/// float; nothing narrows, and text never converts implicitly.
pub(crate) fn accepts(ty: &ColumnType, value: &Value) -> bool {
    match (ty, value) {
        (ColumnType::Integer, Value::Integer(_)) => true,
        (ColumnType::Float, Value::Float(_) | Value::Integer(_)) => true,
        (ColumnType::Text, Value::Text(_)) => true,
        (ColumnType::Boolean, Value::Boolean(_)) => true,
        (ColumnType::Timestamp, Value::Timestamp(_)) => true,
        (ColumnType::Binary, Value::Binary(_)) => true,
        (ColumnType::Json, Value::Json(_)) => true,
        (ColumnType::Uuid, Value::Uuid(_)) => true,
        (ColumnType::Custom(expected), Value::Custom { type_name, .. }) => expected == type_name,
        _ => false,
    }
}

/// Whether two columns may be compared or assigned to each other.
pub(crate) fn columns_compatible(a: &ColumnType, b: &ColumnType) -> bool {
    a == b || (a.is_numeric() && b.is_numeric())
}

/// Kind of `value` if it cannot be bound against `ty`. NULL is left to the
/// nullability check.
pub(crate) fn value_mismatch(ty: &ColumnType, value: &Value) -> Option<String> {
    if value.is_null() || accepts(ty, value) {
        None
    } else {
        Some(value.kind())
    }
}
