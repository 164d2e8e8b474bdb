//! Conversion between [`Value`] and PostgreSQL wire values.
//!
//! Encoding is driven by the parameter types of the prepared statement, so an
//! `Integer` bound to an `int4` column is sent as 4 bytes and one bound to an
//! `int8` column as 8. Custom values travel in text format and are parsed by
//! the server.

use crate::error::{PgError, PgResult};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlgate::Value;
use std::error::Error;
use tokio_postgres::Row;
use tokio_postgres::types::{Format, FromSql, IsNull, Kind, ToSql, Type, to_sql_checked};
use uuid::Uuid;

type BoxError = Box<dyn Error + Sync + Send>;

/// A [`Value`] bound as a statement parameter.
#[derive(Debug, Clone, Copy)]
pub struct SqlArg<'a>(pub &'a Value);

fn mismatch(value: &Value, ty: &Type) -> BoxError {
    format!("cannot encode {} value as {ty}", value.kind()).into()
}

impl ToSql for SqlArg<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Integer(v) => match *ty {
                Type::INT2 => i16::try_from(*v)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*v)?.to_sql(ty, out),
                Type::INT8 => v.to_sql(ty, out),
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::FLOAT8 => (*v as f64).to_sql(ty, out),
                _ => Err(mismatch(self.0, ty)),
            },
            Value::Float(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                Type::FLOAT8 => v.to_sql(ty, out),
                _ => Err(mismatch(self.0, ty)),
            },
            // non-text targets are sent in text format, see encode_format
            Value::Text(s) => s.as_str().to_sql(ty, out),
            Value::Boolean(v) => match *ty {
                Type::BOOL => v.to_sql(ty, out),
                _ => Err(mismatch(self.0, ty)),
            },
            Value::Timestamp(v) => match *ty {
                Type::TIMESTAMPTZ => v.to_sql(ty, out),
                Type::TIMESTAMP => v.naive_utc().to_sql(ty, out),
                Type::DATE => v.date_naive().to_sql(ty, out),
                _ => Err(mismatch(self.0, ty)),
            },
            Value::Binary(v) => match *ty {
                Type::BYTEA => v.as_slice().to_sql(ty, out),
                _ => Err(mismatch(self.0, ty)),
            },
            Value::Json(v) => match *ty {
                Type::JSON | Type::JSONB => v.to_sql(ty, out),
                _ => Err(mismatch(self.0, ty)),
            },
            Value::Uuid(v) => match *ty {
                Type::UUID => v.to_sql(ty, out),
                _ => Err(mismatch(self.0, ty)),
            },
            Value::Custom { repr, .. } => {
                out.extend_from_slice(repr.as_bytes());
                Ok(IsNull::No)
            }
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    fn encode_format(&self, ty: &Type) -> Format {
        match self.0 {
            Value::Custom { .. } => Format::Text,
            Value::Text(_) if !<&str as ToSql>::accepts(ty) => Format::Text,
            _ => Format::Binary,
        }
    }

    to_sql_checked!();
}

/// A decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell(pub Value);

impl<'a> FromSql<'a> for Cell {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        let value = match *ty {
            Type::BOOL => Value::Boolean(bool::from_sql(ty, raw)?),
            Type::INT2 => Value::Integer(i16::from_sql(ty, raw)?.into()),
            Type::INT4 => Value::Integer(i32::from_sql(ty, raw)?.into()),
            Type::INT8 => Value::Integer(i64::from_sql(ty, raw)?),
            Type::OID => Value::Integer(u32::from_sql(ty, raw)?.into()),
            Type::FLOAT4 => Value::Float(f32::from_sql(ty, raw)?.into()),
            Type::FLOAT8 => Value::Float(f64::from_sql(ty, raw)?),
            Type::TIMESTAMPTZ => Value::Timestamp(DateTime::<Utc>::from_sql(ty, raw)?),
            Type::TIMESTAMP => Value::Timestamp(NaiveDateTime::from_sql(ty, raw)?.and_utc()),
            Type::DATE => Value::custom("date", NaiveDate::from_sql(ty, raw)?.to_string()),
            Type::TIME => Value::custom("time", NaiveTime::from_sql(ty, raw)?.to_string()),
            Type::BYTEA => Value::Binary(Vec::<u8>::from_sql(ty, raw)?),
            Type::JSON | Type::JSONB => Value::Json(serde_json::Value::from_sql(ty, raw)?),
            Type::UUID => Value::Uuid(Uuid::from_sql(ty, raw)?),
            _ if <&str as FromSql>::accepts(ty) => Value::Text(String::from_sql(ty, raw)?),
            _ => match ty.kind() {
                Kind::Enum(_) => Value::custom(ty.name(), std::str::from_utf8(raw)?),
                _ => return Err(format!("unsupported column type {ty}").into()),
            },
        };
        Ok(Cell(value))
    }

    fn from_sql_null(_: &Type) -> Result<Self, BoxError> {
        Ok(Cell(Value::Null))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

/// Decode every column of `row`, in order.
pub fn decode_row(row: &Row) -> PgResult<Vec<Value>> {
    (0..row.len())
        .map(|idx| {
            row.try_get::<_, Cell>(idx)
                .map(|cell| cell.0)
                .map_err(|e| PgError::decode(row.columns()[idx].name(), e.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &Value, ty: &Type) -> Result<(IsNull, Vec<u8>), BoxError> {
        let mut out = BytesMut::new();
        let is_null = SqlArg(value).to_sql_checked(ty, &mut out)?;
        Ok((is_null, out.to_vec()))
    }

    fn mood() -> Type {
        Type::new(
            "mood".to_string(),
            90_001,
            Kind::Enum(vec!["happy".to_string(), "sad".to_string()]),
            "public".to_string(),
        )
    }

    #[test]
    fn test_integer_width_follows_parameter_type() {
        let v = Value::Integer(7);
        assert_eq!(encode(&v, &Type::INT2).unwrap().1, [0, 7]);
        assert_eq!(encode(&v, &Type::INT4).unwrap().1, [0, 0, 0, 7]);
        assert_eq!(encode(&v, &Type::INT8).unwrap().1.len(), 8);
        assert_eq!(encode(&v, &Type::FLOAT8).unwrap().1, 7.0f64.to_be_bytes());
    }

    #[test]
    fn test_integer_overflow_is_an_error() {
        assert!(encode(&Value::Integer(70_000), &Type::INT2).is_err());
        assert!(encode(&Value::Integer(i64::MAX), &Type::INT4).is_err());
    }

    #[test]
    fn test_null_and_mismatch() {
        assert!(matches!(
            encode(&Value::Null, &Type::INT4).unwrap().0,
            IsNull::Yes
        ));
        let err = encode(&Value::Boolean(true), &Type::INT4).err().unwrap();
        assert!(err.to_string().contains("boolean"));
        assert!(encode(&Value::Uuid(Uuid::nil()), &Type::TEXT).is_err());
    }

    #[test]
    fn test_timestamp_targets() {
        let ts = DateTime::from_timestamp(0, 0).unwrap();
        let v = Value::Timestamp(ts);
        assert!(encode(&v, &Type::TIMESTAMPTZ).is_ok());
        assert!(encode(&v, &Type::TIMESTAMP).is_ok());
        assert!(encode(&v, &Type::DATE).is_ok());
        assert!(encode(&v, &Type::TEXT).is_err());
    }

    #[test]
    fn test_custom_values_use_text_format() {
        let v = Value::custom("mood", "happy");
        let arg = SqlArg(&v);
        assert!(matches!(arg.encode_format(&mood()), Format::Text));
        assert_eq!(encode(&v, &mood()).unwrap().1, b"happy");

        let text = Value::from("abc");
        assert!(matches!(SqlArg(&text).encode_format(&Type::TEXT), Format::Binary));
        assert!(matches!(SqlArg(&text).encode_format(&mood()), Format::Text));
        assert!(matches!(SqlArg(&Value::Integer(1)).encode_format(&Type::INT4), Format::Binary));
    }

    #[test]
    fn test_decode_scalars() {
        let cell = |ty: &Type, raw: &[u8]| Cell::from_sql(ty, raw).unwrap().0;
        assert_eq!(cell(&Type::INT4, &[0, 0, 1, 0]), Value::Integer(256));
        assert_eq!(cell(&Type::INT2, &[0xff, 0xff]), Value::Integer(-1));
        assert_eq!(cell(&Type::BOOL, &[1]), Value::Boolean(true));
        assert_eq!(cell(&Type::TEXT, b"hi"), Value::from("hi"));
        assert_eq!(cell(&Type::VARCHAR, b"hi"), Value::from("hi"));
        assert_eq!(cell(&Type::BYTEA, &[1, 2]), Value::Binary(vec![1, 2]));
        assert_eq!(
            cell(&Type::FLOAT8, &2.5f64.to_be_bytes()),
            Value::Float(2.5)
        );
        assert_eq!(
            cell(&Type::UUID, Uuid::nil().as_bytes()),
            Value::Uuid(Uuid::nil())
        );
    }

    #[test]
    fn test_decode_enum_and_null() {
        assert_eq!(
            Cell::from_sql(&mood(), b"sad").unwrap().0,
            Value::custom("mood", "sad")
        );
        assert_eq!(Cell::from_sql_null(&Type::INT4).unwrap().0, Value::Null);
    }

    #[test]
    fn test_decode_date_as_custom() {
        // 2000-01-02: one day after the PostgreSQL epoch
        assert_eq!(
            Cell::from_sql(&Type::DATE, &1i32.to_be_bytes()).unwrap().0,
            Value::custom("date", "2000-01-02")
        );
    }

    #[test]
    fn test_decode_unsupported_type() {
        let err = Cell::from_sql(&Type::NUMERIC, &[0, 0]).unwrap_err();
        assert!(err.to_string().contains("numeric"));
    }
}
