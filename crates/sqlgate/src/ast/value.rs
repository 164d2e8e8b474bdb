//! Literal values carried by the AST and handed to drivers.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A typed literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Binary(Vec<u8>),
    Json(serde_json::Value),
    Uuid(Uuid),
    /// Value for a [`ColumnType::Custom`](crate::schema::ColumnType::Custom) column,
    /// carried in its textual representation.
    Custom { type_name: String, repr: String },
}

impl Value {
    /// Create a value for a registered custom type.
    pub fn custom(type_name: impl Into<String>, repr: impl Into<String>) -> Self {
        Self::Custom {
            type_name: type_name.into(),
            repr: repr.into(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short description of the value's kind, used in error messages.
    pub fn kind(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Integer(_) => "integer".to_string(),
            Self::Float(_) => "float".to_string(),
            Self::Text(_) => "text".to_string(),
            Self::Boolean(_) => "boolean".to_string(),
            Self::Timestamp(_) => "timestamp".to_string(),
            Self::Binary(_) => "binary".to_string(),
            Self::Json(_) => "json".to_string(),
            Self::Uuid(_) => "uuid".to_string(),
            Self::Custom { type_name, .. } => format!("custom:{type_name}"),
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_value_from! {
    i64 => Integer,
    i32 => Integer,
    i16 => Integer,
    u32 => Integer,
    f64 => Float,
    f32 => Float,
    bool => Boolean,
    String => Text,
    &str => Text,
    DateTime<Utc> => Timestamp,
    Vec<u8> => Binary,
    &[u8] => Binary,
    serde_json::Value => Json,
    Uuid => Uuid,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
