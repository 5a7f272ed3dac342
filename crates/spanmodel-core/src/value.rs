//! Dynamically-typed column values and their REST wire encoding.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{CastError, Error, Result};
use crate::time::{format_timestamp, parse_timestamp};
use crate::types::SqlType;

/// A single column or parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    /// Decimal kept as its canonical text to avoid precision loss.
    Numeric(String),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    /// Structured JSON. Marshalled with the JSON type code, never as STRING.
    Json(serde_json::Value),
    Array(Vec<Value>),
}

impl Value {
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Human-readable kind name for diagnostics.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int64(_) => "int64",
            Value::Float64(_) => "float64",
            Value::Numeric(_) => "numeric",
            Value::Text(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::Timestamp(_) => "timestamp",
            Value::Json(_) => "json",
            Value::Array(_) => "array",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Numeric(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Json(j) => Some(j),
            _ => None,
        }
    }

    /// Wire type of this value, or `None` for an untyped NULL.
    ///
    /// Arrays take the type of their first non-null element and fall back
    /// to `ARRAY<STRING>` when empty.
    pub fn sql_type(&self) -> Option<SqlType> {
        Some(match self {
            Value::Null => return None,
            Value::Bool(_) => SqlType::Bool,
            Value::Int64(_) => SqlType::Int64,
            Value::Float64(_) => SqlType::Float64,
            Value::Numeric(_) => SqlType::Numeric,
            Value::Text(_) => SqlType::String,
            Value::Bytes(_) => SqlType::Bytes,
            Value::Date(_) => SqlType::Date,
            Value::Timestamp(_) => SqlType::Timestamp,
            Value::Json(_) => SqlType::Json,
            Value::Array(items) => {
                let element = items
                    .iter()
                    .find_map(Value::sql_type)
                    .unwrap_or(SqlType::String);
                SqlType::Array(Box::new(element))
            }
        })
    }

    /// Encode for the REST protocol.
    ///
    /// INT64 travels as a decimal string, BYTES as base64, TIMESTAMP as
    /// RFC 3339 in UTC, and JSON as its encoded text (the type code in
    /// `paramTypes` is what marks it as structured).
    pub fn to_wire(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Null => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Int64(n) => J::String(n.to_string()),
            Value::Float64(f) => {
                if f.is_nan() {
                    J::String("NaN".to_string())
                } else if f.is_infinite() {
                    J::String(if *f > 0.0 { "Infinity" } else { "-Infinity" }.to_string())
                } else {
                    serde_json::Number::from_f64(*f).map_or(J::Null, J::Number)
                }
            }
            Value::Numeric(s) | Value::Text(s) => J::String(s.clone()),
            Value::Bytes(b) => J::String(BASE64.encode(b)),
            Value::Date(d) => J::String(d.format("%Y-%m-%d").to_string()),
            Value::Timestamp(ts) => J::String(format_timestamp(ts)),
            Value::Json(j) => J::String(j.to_string()),
            Value::Array(items) => J::Array(items.iter().map(Value::to_wire).collect()),
        }
    }

    /// Decode a REST-encoded value of the given type.
    ///
    /// JSON columns decode to [`Value::Text`] holding the raw document; turning
    /// that into structured data is the job of the column cast on read.
    pub fn from_wire(raw: &serde_json::Value, ty: &SqlType) -> Result<Value> {
        use serde_json::Value as J;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        let mismatch = || Error::Cast(CastError::unsupported(ty.code(), json_kind(raw)));
        let text = || raw.as_str().ok_or_else(mismatch);

        Ok(match ty {
            SqlType::Bool => Value::Bool(raw.as_bool().ok_or_else(mismatch)?),
            SqlType::Int64 => match raw {
                J::String(s) => Value::Int64(s.parse().map_err(|_| mismatch())?),
                J::Number(n) => Value::Int64(n.as_i64().ok_or_else(mismatch)?),
                _ => return Err(mismatch()),
            },
            SqlType::Float64 => match raw {
                J::Number(n) => Value::Float64(n.as_f64().ok_or_else(mismatch)?),
                J::String(s) => match s.as_str() {
                    "NaN" => Value::Float64(f64::NAN),
                    "Infinity" => Value::Float64(f64::INFINITY),
                    "-Infinity" => Value::Float64(f64::NEG_INFINITY),
                    _ => return Err(mismatch()),
                },
                _ => return Err(mismatch()),
            },
            SqlType::Numeric => Value::Numeric(text()?.to_string()),
            SqlType::String | SqlType::Json => Value::Text(text()?.to_string()),
            SqlType::Bytes => Value::Bytes(BASE64.decode(text()?).map_err(|_| mismatch())?),
            SqlType::Date => Value::Date(
                NaiveDate::parse_from_str(text()?, "%Y-%m-%d").map_err(|_| mismatch())?,
            ),
            SqlType::Timestamp => Value::Timestamp(parse_timestamp(text()?).ok_or_else(mismatch)?),
            SqlType::Array(element) => {
                let items = raw.as_array().ok_or_else(mismatch)?;
                Value::Array(
                    items
                        .iter()
                        .map(|item| Value::from_wire(item, element))
                        .collect::<Result<Vec<_>>>()?,
                )
            }
        })
    }
}

fn json_kind(raw: &serde_json::Value) -> &'static str {
    match raw {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int64(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_int64_travels_as_string() {
        assert_eq!(Value::Int64(42).to_wire(), json!("42"));
        assert_eq!(
            Value::from_wire(&json!("42"), &SqlType::Int64).unwrap(),
            Value::Int64(42)
        );
    }

    #[test]
    fn test_json_value_encodes_as_text_with_json_type() {
        let v = Value::Json(json!({"a": 1}));
        assert_eq!(v.to_wire(), json!("{\"a\":1}"));
        assert_eq!(v.sql_type(), Some(SqlType::Json));
    }

    #[test]
    fn test_json_column_decodes_to_raw_text() {
        let v = Value::from_wire(&json!("{\"a\":1}"), &SqlType::Json).unwrap();
        assert_eq!(v, Value::Text("{\"a\":1}".to_string()));
    }

    #[test]
    fn test_bytes_base64() {
        let v = Value::Bytes(b"hi".to_vec());
        assert_eq!(v.to_wire(), json!("aGk="));
        assert_eq!(Value::from_wire(&json!("aGk="), &SqlType::Bytes).unwrap(), v);
    }

    #[test]
    fn test_timestamp_wire_is_utc_rfc3339() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(Value::Timestamp(ts).to_wire(), json!("2024-03-01T12:00:00Z"));
        assert_eq!(
            Value::from_wire(&json!("2024-03-01T12:00:00Z"), &SqlType::Timestamp).unwrap(),
            Value::Timestamp(ts)
        );
    }

    #[test]
    fn test_float_specials() {
        assert_eq!(Value::Float64(f64::INFINITY).to_wire(), json!("Infinity"));
        let nan = Value::from_wire(&json!("NaN"), &SqlType::Float64).unwrap();
        assert!(matches!(nan, Value::Float64(f) if f.is_nan()));
    }

    #[test]
    fn test_array_wire_roundtrip() {
        let ty = SqlType::Array(Box::new(SqlType::Int64));
        let v = Value::from_wire(&json!(["1", null, "3"]), &ty).unwrap();
        assert_eq!(
            v,
            Value::Array(vec![Value::Int64(1), Value::Null, Value::Int64(3)])
        );
        assert_eq!(v.sql_type(), Some(ty));
    }

    #[test]
    fn test_type_mismatch_is_cast_error() {
        let err = Value::from_wire(&json!(true), &SqlType::Int64).unwrap_err();
        assert_eq!(err.category(), "UnsupportedCastInput");
    }

    #[test]
    fn test_option_into_value() {
        let none: Option<i64> = None;
        assert_eq!(Value::from(none), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".to_string()));
    }
}
