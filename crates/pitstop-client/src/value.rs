//! Dynamic SQL values and positional parameter lists.
//!
//! Parameters are carried as [`SqlValue`] and bound strictly positionally
//! through the driver protocol; values never end up interpolated into
//! statement text.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A dynamically typed SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// BOOLEAN.
    Bool(bool),
    /// SMALLINT.
    Int2(i16),
    /// INTEGER.
    Int4(i32),
    /// BIGINT.
    Int8(i64),
    /// REAL.
    Float4(f32),
    /// DOUBLE PRECISION.
    Float8(f64),
    /// TEXT / VARCHAR / CHAR.
    Text(String),
    /// UUID.
    Uuid(Uuid),
    /// NUMERIC / DECIMAL.
    Numeric(Decimal),
    /// DATE.
    Date(NaiveDate),
    /// TIMESTAMP WITHOUT TIME ZONE.
    Timestamp(NaiveDateTime),
    /// TIMESTAMP WITH TIME ZONE.
    TimestampTz(DateTime<Utc>),
    /// JSON / JSONB.
    Json(serde_json::Value),
    /// BYTEA.
    Bytes(Vec<u8>),
}

impl SqlValue {
    /// Whether this value is SQL NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// SQL type name, for column metadata and error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Bool(_) => "BOOL",
            Self::Int2(_) => "INT2",
            Self::Int4(_) => "INT4",
            Self::Int8(_) => "INT8",
            Self::Float4(_) => "FLOAT4",
            Self::Float8(_) => "FLOAT8",
            Self::Text(_) => "TEXT",
            Self::Uuid(_) => "UUID",
            Self::Numeric(_) => "NUMERIC",
            Self::Date(_) => "DATE",
            Self::Timestamp(_) => "TIMESTAMP",
            Self::TimestampTz(_) => "TIMESTAMPTZ",
            Self::Json(_) => "JSONB",
            Self::Bytes(_) => "BYTEA",
        }
    }

    /// Convert to a JSON value for response payloads.
    ///
    /// Numerics, dates, and byte strings become strings so no precision is
    /// lost in transit.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::Null => Value::Null,
            Self::Bool(v) => Value::Bool(*v),
            Self::Int2(v) => Value::from(*v),
            Self::Int4(v) => Value::from(*v),
            Self::Int8(v) => Value::from(*v),
            Self::Float4(v) => {
                serde_json::Number::from_f64(f64::from(*v)).map_or(Value::Null, Value::Number)
            }
            Self::Float8(v) => {
                serde_json::Number::from_f64(*v).map_or(Value::Null, Value::Number)
            }
            Self::Text(s) => Value::String(s.clone()),
            Self::Uuid(u) => Value::String(u.to_string()),
            Self::Numeric(d) => Value::String(d.to_string()),
            Self::Date(d) => Value::String(d.to_string()),
            Self::Timestamp(t) => Value::String(t.to_string()),
            Self::TimestampTz(t) => Value::String(t.to_rfc3339()),
            Self::Json(j) => j.clone(),
            Self::Bytes(b) => {
                let mut hex = String::with_capacity(2 + b.len() * 2);
                hex.push_str("\\x");
                for byte in b {
                    use std::fmt::Write;
                    let _ = write!(hex, "{byte:02x}");
                }
                Value::String(hex)
            }
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i16> for SqlValue {
    fn from(v: i16) -> Self {
        Self::Int2(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Int4(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int8(v)
    }
}

impl From<f32> for SqlValue {
    fn from(v: f32) -> Self {
        Self::Float4(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        Self::Float8(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        Self::Numeric(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        Self::Timestamp(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::TimestampTz(v)
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Build a positional parameter list from native values.
///
/// ```
/// use pitstop_client::{SqlValue, params};
///
/// let values = params![42, "main st", None::<f64>];
/// assert_eq!(values[0], SqlValue::Int4(42));
/// assert!(values[2].is_null());
/// ```
#[macro_export]
macro_rules! params {
    () => {
        Vec::<$crate::SqlValue>::new()
    };
    ($($value:expr),+ $(,)?) => {
        vec![$($crate::SqlValue::from($value)),+]
    };
}

// Positional binding bridge into the driver protocol. The target column type
// is only known at bind time, so integer and float values are widened or
// narrowed to fit it; a lossy narrowing fails the bind.
impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Self::Null => Ok(IsNull::Yes),
            Self::Bool(v) => v.to_sql(ty, out),
            Self::Int2(v) => bind_int(i64::from(*v), ty, out),
            Self::Int4(v) => bind_int(i64::from(*v), ty, out),
            Self::Int8(v) => bind_int(*v, ty, out),
            Self::Float4(v) => bind_float(f64::from(*v), ty, out),
            Self::Float8(v) => bind_float(*v, ty, out),
            Self::Text(v) if *ty == Type::UUID => Uuid::parse_str(v)?.to_sql(ty, out),
            Self::Text(v) => v.to_sql(ty, out),
            Self::Uuid(v) => v.to_sql(ty, out),
            Self::Numeric(v) => v.to_sql(ty, out),
            Self::Date(v) => v.to_sql(ty, out),
            Self::Timestamp(v) => v.to_sql(ty, out),
            Self::TimestampTz(v) => v.to_sql(ty, out),
            Self::Json(v) => v.to_sql(ty, out),
            Self::Bytes(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Values are dynamically typed; mismatches surface from to_sql.
        true
    }

    to_sql_checked!();
}

fn bind_int(
    v: i64,
    ty: &Type,
    out: &mut bytes::BytesMut,
) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
    if *ty == Type::INT2 {
        i16::try_from(v)?.to_sql(ty, out)
    } else if *ty == Type::INT4 {
        i32::try_from(v)?.to_sql(ty, out)
    } else if *ty == Type::FLOAT4 {
        (v as f32).to_sql(ty, out)
    } else if *ty == Type::FLOAT8 {
        (v as f64).to_sql(ty, out)
    } else if *ty == Type::NUMERIC {
        Decimal::from(v).to_sql(ty, out)
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR {
        v.to_string().to_sql(ty, out)
    } else {
        v.to_sql(ty, out)
    }
}

fn bind_float(
    v: f64,
    ty: &Type,
    out: &mut bytes::BytesMut,
) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
    if *ty == Type::FLOAT4 {
        (v as f32).to_sql(ty, out)
    } else if *ty == Type::NUMERIC {
        Decimal::try_from(v)?.to_sql(ty, out)
    } else {
        v.to_sql(ty, out)
    }
}

/// Conversion out of a dynamically typed [`SqlValue`].
pub trait FromSql: Sized {
    /// Convert, failing with [`Error::Decode`] on a type mismatch.
    fn from_sql(value: &SqlValue) -> Result<Self>;
}

fn mismatch<T>(value: &SqlValue) -> Error {
    Error::Decode(format!(
        "cannot read {} as {}",
        value.type_name(),
        std::any::type_name::<T>()
    ))
}

impl FromSql for bool {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Bool(v) => Ok(*v),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl FromSql for i16 {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Int2(v) => Ok(*v),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl FromSql for i32 {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Int2(v) => Ok(Self::from(*v)),
            SqlValue::Int4(v) => Ok(*v),
            SqlValue::Int8(v) => Self::try_from(*v).map_err(|_| mismatch::<Self>(value)),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl FromSql for i64 {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Int2(v) => Ok(Self::from(*v)),
            SqlValue::Int4(v) => Ok(Self::from(*v)),
            SqlValue::Int8(v) => Ok(*v),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl FromSql for f32 {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Float4(v) => Ok(*v),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl FromSql for f64 {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Float4(v) => Ok(Self::from(*v)),
            SqlValue::Float8(v) => Ok(*v),
            SqlValue::Numeric(d) => d.to_f64().ok_or_else(|| mismatch::<Self>(value)),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl FromSql for String {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Text(v) => Ok(v.clone()),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl FromSql for Uuid {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Uuid(v) => Ok(*v),
            SqlValue::Text(v) => Self::parse_str(v).map_err(|_| mismatch::<Self>(value)),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl FromSql for Decimal {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Numeric(v) => Ok(*v),
            SqlValue::Int2(v) => Ok(Self::from(*v)),
            SqlValue::Int4(v) => Ok(Self::from(*v)),
            SqlValue::Int8(v) => Ok(Self::from(*v)),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl FromSql for NaiveDate {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Date(v) => Ok(*v),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl FromSql for NaiveDateTime {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Timestamp(v) => Ok(*v),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl FromSql for DateTime<Utc> {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::TimestampTz(v) => Ok(*v),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl FromSql for serde_json::Value {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Json(v) => Ok(v.clone()),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl FromSql for Vec<u8> {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Bytes(v) => Ok(v.clone()),
            other => Err(mismatch::<Self>(other)),
        }
    }
}

impl<T: FromSql> FromSql for Option<T> {
    fn from_sql(value: &SqlValue) -> Result<Self> {
        match value {
            SqlValue::Null => Ok(None),
            other => T::from_sql(other).map(Some),
        }
    }
}
