//! Column casting for kinds with no native host representation.
//!
//! Two column kinds need help crossing the wire:
//!
//! - **JSON** columns store structured documents natively. On read the driver
//!   may hand back either a pre-parsed structure or the raw JSON text; both
//!   decode to the same result. On write the value is wrapped in a
//!   [`JsonLiteral`] so it is marshalled with the JSON type code rather than
//!   as a STRING that merely looks like JSON.
//! - **Interleaved keys** embed the parent row's key ahead of the child's own
//!   key parts. They are validated on write and pass through on read.
//!
//! Every other column kind passes through untouched.

use std::fmt;

use serde::Serialize;
use serde_json::Map;
use spanmodel_core::{CastError, Error, ResultSet, Result, SqlType, Value};

/// How a column's values are cast between host and wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// Values pass through unchanged.
    Plain,
    /// Structured JSON column.
    Json,
    /// Composite key of an interleaved child table.
    InterleaveKey,
}

impl ColumnKind {
    /// Cast kind for a column of the given wire type.
    pub fn for_sql_type(ty: &SqlType) -> Self {
        match ty {
            SqlType::Json => ColumnKind::Json,
            _ => ColumnKind::Plain,
        }
    }
}

// ============================================================================
// JSON
// ============================================================================

/// The closed set of values accepted for a JSON column write.
#[derive(Debug, Clone, PartialEq)]
pub enum CastableInput {
    /// SQL NULL.
    Null,
    /// A key/value document.
    Mapping(Map<String, serde_json::Value>),
    /// Any other structured value produced by serialization (e.g. a list).
    Serializable(serde_json::Value),
    /// JSON text to be stored as structure.
    Text(String),
}

impl CastableInput {
    /// Serialize a host value. Objects become [`CastableInput::Mapping`];
    /// arrays become [`CastableInput::Serializable`]. Bare scalars are not
    /// documents and are rejected.
    pub fn serializable<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        match serde_json::to_value(value)? {
            serde_json::Value::Null => Ok(CastableInput::Null),
            serde_json::Value::Object(map) => Ok(CastableInput::Mapping(map)),
            array @ serde_json::Value::Array(_) => Ok(CastableInput::Serializable(array)),
            other => Err(Error::Cast(CastError::unsupported(
                "a serializable document",
                json_scalar_name(&other),
            ))),
        }
    }
}

impl TryFrom<Value> for CastableInput {
    type Error = Error;

    /// Classify a column value. Only NULL, JSON and text are accepted;
    /// everything else fails with `UnsupportedCastInput` instead of being
    /// coerced.
    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(CastableInput::Null),
            Value::Json(serde_json::Value::Object(map)) => Ok(CastableInput::Mapping(map)),
            Value::Json(other) => Ok(CastableInput::Serializable(other)),
            Value::Text(text) => Ok(CastableInput::Text(text)),
            other => Err(Error::Cast(CastError::unsupported(
                "null, a JSON document or JSON text",
                other.type_name(),
            ))),
        }
    }
}

impl From<Map<String, serde_json::Value>> for CastableInput {
    fn from(map: Map<String, serde_json::Value>) -> Self {
        CastableInput::Mapping(map)
    }
}

/// A value ready to be written to a JSON column.
///
/// Carries the structured document (or SQL NULL) and always marshals with
/// the JSON type code.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonLiteral {
    value: Option<serde_json::Value>,
}

impl JsonLiteral {
    pub const fn null() -> Self {
        Self { value: None }
    }

    pub const fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// The document, or `None` for SQL NULL.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        self.value.as_ref()
    }

    /// Wire type this literal must be sent as.
    pub const fn wire_type(&self) -> SqlType {
        SqlType::Json
    }

    /// Unwrap into a column value: [`Value::Json`] or [`Value::Null`].
    pub fn into_value(self) -> Value {
        self.value.map_or(Value::Null, Value::Json)
    }

    /// REST encoding: the document's JSON text, or `null`.
    pub fn to_wire(&self) -> serde_json::Value {
        self.value
            .as_ref()
            .map_or(serde_json::Value::Null, |v| serde_json::Value::String(v.to_string()))
    }
}

impl fmt::Display for JsonLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "JSON '{}'", v),
            None => write!(f, "NULL"),
        }
    }
}

/// Bidirectional conversion for JSON columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Decode a raw JSON column value.
    ///
    /// - NULL stays NULL.
    /// - A structured value is returned unchanged.
    /// - Text is parsed as a JSON document.
    /// - Anything else fails with `UnsupportedCastInput`.
    pub fn decode(raw: Value) -> Result<Value> {
        match raw {
            Value::Null => Ok(Value::Null),
            json @ Value::Json(_) => Ok(json),
            Value::Text(text) => parse_json(&text).map(Value::Json),
            other => Err(Error::Cast(CastError::unsupported(
                "null, a JSON document or JSON text",
                other.type_name(),
            ))),
        }
    }

    /// Encode a host value for a JSON column.
    ///
    /// Text is treated as JSON content and parsed, so `decode(encode(text))`
    /// yields the structure, not the original string.
    pub fn encode(input: CastableInput) -> Result<JsonLiteral> {
        let value = match input {
            CastableInput::Null => None,
            CastableInput::Mapping(map) => Some(serde_json::Value::Object(map)),
            CastableInput::Serializable(value) => Some(value),
            CastableInput::Text(text) => Some(parse_json(&text)?),
        };
        Ok(JsonLiteral { value })
    }

    /// Classify a column value and encode it.
    pub fn encode_value(value: Value) -> Result<JsonLiteral> {
        Self::encode(CastableInput::try_from(value)?)
    }
}

fn parse_json(text: &str) -> Result<serde_json::Value> {
    serde_json::from_str(text).map_err(|e| Error::Cast(CastError::malformed_json(e)))
}

fn json_scalar_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        _ => "value",
    }
}

// ============================================================================
// Interleaved keys
// ============================================================================

/// Primary key of a row in an interleaved child table: the parent's key parts
/// followed by the child's own parts.
#[derive(Debug, Clone, PartialEq)]
pub struct InterleaveKey {
    parts: Vec<Value>,
    parent_len: usize,
}

impl InterleaveKey {
    /// Key of a root (non-interleaved) row.
    pub fn root(parts: Vec<Value>) -> Result<Self> {
        check_key_parts(&parts)?;
        Ok(Self {
            parent_len: 0,
            parts,
        })
    }

    /// Key of a row interleaved under `self`.
    pub fn child(&self, parts: Vec<Value>) -> Result<Self> {
        check_key_parts(&parts)?;
        let mut all = self.parts.clone();
        all.extend(parts);
        Ok(Self {
            parent_len: self.parts.len(),
            parts: all,
        })
    }

    /// Parse a column value: an array of parts or a single scalar part.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(parts) => Self::root(parts),
            scalar => Self::root(vec![scalar]),
        }
    }

    pub fn parts(&self) -> &[Value] {
        &self.parts
    }

    /// The parent row's key, if this key was built with [`child`](Self::child).
    pub fn parent(&self) -> Option<InterleaveKey> {
        (self.parent_len > 0).then(|| Self {
            parts: self.parts[..self.parent_len].to_vec(),
            parent_len: 0,
        })
    }

    pub fn into_value(self) -> Value {
        Value::Array(self.parts)
    }

    /// REST encoding used inside a `KeySet`.
    pub fn to_wire(&self) -> serde_json::Value {
        serde_json::Value::Array(self.parts.iter().map(Value::to_wire).collect())
    }
}

fn check_key_parts(parts: &[Value]) -> Result<()> {
    if parts.is_empty() {
        return Err(Error::Cast(CastError::unsupported(
            "at least one key part",
            "an empty key",
        )));
    }
    for part in parts {
        if let Some(ty) = part.sql_type() {
            if !ty.is_key_compatible() {
                return Err(Error::Cast(CastError::unsupported(
                    "a scalar key part",
                    part.type_name(),
                )));
            }
        }
    }
    Ok(())
}

// ============================================================================
// Column dispatch
// ============================================================================

/// Cast a value read from a column of `kind`.
pub fn cast_column_on_read(kind: ColumnKind, raw: Value) -> Result<Value> {
    match kind {
        ColumnKind::Json => JsonCodec::decode(raw),
        ColumnKind::InterleaveKey | ColumnKind::Plain => Ok(raw),
    }
}

/// Cast a value about to be written to a column of `kind`.
pub fn cast_column_on_write(kind: ColumnKind, value: Value) -> Result<Value> {
    match kind {
        ColumnKind::Json => Ok(JsonCodec::encode_value(value)?.into_value()),
        ColumnKind::InterleaveKey => Ok(InterleaveKey::from_value(value)?.into_value()),
        ColumnKind::Plain => Ok(value),
    }
}

/// Decode every JSON (and `ARRAY<JSON>`) column of a result set in place.
pub fn decode_result_set(set: &mut ResultSet) -> Result<()> {
    let targets: Vec<(usize, bool)> = set
        .columns()
        .iter()
        .enumerate()
        .filter_map(|(idx, col)| match &col.sql_type {
            SqlType::Json => Some((idx, false)),
            SqlType::Array(element) if **element == SqlType::Json => Some((idx, true)),
            _ => None,
        })
        .collect();
    if targets.is_empty() {
        return Ok(());
    }

    for row in set.rows_mut() {
        let values = row.values_mut();
        for &(idx, is_array) in &targets {
            let Some(slot) = values.get_mut(idx) else {
                continue;
            };
            let raw = std::mem::replace(slot, Value::Null);
            *slot = match raw {
                Value::Array(items) if is_array => Value::Array(
                    items
                        .into_iter()
                        .map(JsonCodec::decode)
                        .collect::<Result<Vec<_>>>()?,
                ),
                other => JsonCodec::decode(other)?,
            };
        }
    }
    Ok(())
}
