//! Column type codes as they appear on the wire.

use serde::{Deserialize, Serialize};

/// Spanner type code for a column or parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Bool,
    Int64,
    Float64,
    Numeric,
    String,
    Bytes,
    Date,
    Timestamp,
    /// Native structured JSON, distinct from a STRING holding JSON text.
    Json,
    Array(Box<SqlType>),
}

impl SqlType {
    /// The `code` string used in `Type` messages.
    pub const fn code(&self) -> &'static str {
        match self {
            SqlType::Bool => "BOOL",
            SqlType::Int64 => "INT64",
            SqlType::Float64 => "FLOAT64",
            SqlType::Numeric => "NUMERIC",
            SqlType::String => "STRING",
            SqlType::Bytes => "BYTES",
            SqlType::Date => "DATE",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Json => "JSON",
            SqlType::Array(_) => "ARRAY",
        }
    }

    /// Parse a type code. Array element types are not encoded in the code
    /// itself, so `ARRAY` needs [`SqlType::from_type_json`].
    pub fn from_code(code: &str) -> Option<Self> {
        Some(match code {
            "BOOL" => SqlType::Bool,
            "INT64" => SqlType::Int64,
            "FLOAT64" => SqlType::Float64,
            "NUMERIC" => SqlType::Numeric,
            "STRING" => SqlType::String,
            "BYTES" => SqlType::Bytes,
            "DATE" => SqlType::Date,
            "TIMESTAMP" => SqlType::Timestamp,
            "JSON" => SqlType::Json,
            _ => return None,
        })
    }

    /// Parse a `{"code": ..., "arrayElementType": {...}}` type object.
    pub fn from_type_json(ty: &serde_json::Value) -> Option<Self> {
        let code = ty.get("code")?.as_str()?;
        if code == "ARRAY" {
            let element = Self::from_type_json(ty.get("arrayElementType")?)?;
            return Some(SqlType::Array(Box::new(element)));
        }
        Self::from_code(code)
    }

    /// Render as a `Type` object for `paramTypes`.
    pub fn to_type_json(&self) -> serde_json::Value {
        match self {
            SqlType::Array(element) => serde_json::json!({
                "code": "ARRAY",
                "arrayElementType": element.to_type_json(),
            }),
            other => serde_json::json!({ "code": other.code() }),
        }
    }

    /// Types allowed as primary key parts.
    pub const fn is_key_compatible(&self) -> bool {
        !matches!(self, SqlType::Json | SqlType::Array(_))
    }
}
