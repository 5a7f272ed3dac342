//! Result rows returned by reads.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::time::parse_timestamp;
use crate::types::SqlType;
use crate::value::Value;

/// Name and type of a result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub sql_type: SqlType,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
        }
    }
}

/// A single row. Column metadata is shared across all rows of a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[ColumnInfo]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[ColumnInfo]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_named(&self, name: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c.name == name)?;
        self.values.get(idx)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [Value] {
        &mut self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Rows plus the metadata the server returned with them.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    columns: Arc<[ColumnInfo]>,
    rows: Vec<Row>,
    read_timestamp: Option<DateTime<Utc>>,
}

impl ResultSet {
    pub fn new(columns: Vec<ColumnInfo>, rows: Vec<Vec<Value>>) -> Self {
        let columns: Arc<[ColumnInfo]> = columns.into();
        let rows = rows
            .into_iter()
            .map(|values| Row::new(Arc::clone(&columns), values))
            .collect();
        Self {
            columns,
            rows,
            read_timestamp: None,
        }
    }

    #[must_use]
    pub fn with_read_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.read_timestamp = Some(ts);
        self
    }

    /// Parse a REST `ResultSet` body.
    ///
    /// Reads `metadata.rowType.fields` for column types and
    /// `metadata.transaction.readTimestamp` when the server returned one.
    pub fn from_wire(body: &serde_json::Value) -> Result<Self> {
        let fields = body
            .pointer("/metadata/rowType/fields")
            .and_then(|f| f.as_array())
            .ok_or_else(|| Error::Custom("result set is missing metadata.rowType".to_string()))?;

        let columns = fields
            .iter()
            .map(|field| {
                let name = field.get("name").and_then(|n| n.as_str()).unwrap_or("");
                let ty = field
                    .get("type")
                    .and_then(SqlType::from_type_json)
                    .ok_or_else(|| {
                        Error::Custom(format!("unsupported type for column '{}'", name))
                    })?;
                Ok(ColumnInfo::new(name, ty))
            })
            .collect::<Result<Vec<_>>>()?;

        let empty = Vec::new();
        let raw_rows = body
            .get("rows")
            .and_then(|r| r.as_array())
            .unwrap_or(&empty);

        let mut rows = Vec::with_capacity(raw_rows.len());
        for raw in raw_rows {
            let cells = raw
                .as_array()
                .ok_or_else(|| Error::Custom("result row is not an array".to_string()))?;
            if cells.len() != columns.len() {
                return Err(Error::Custom(format!(
                    "result row has {} cells, expected {}",
                    cells.len(),
                    columns.len()
                )));
            }
            let values = cells
                .iter()
                .zip(&columns)
                .map(|(cell, col)| Value::from_wire(cell, &col.sql_type))
                .collect::<Result<Vec<_>>>()?;
            rows.push(values);
        }

        let mut set = Self::new(columns, rows);
        if let Some(ts) = body
            .pointer("/metadata/transaction/readTimestamp")
            .and_then(|t| t.as_str())
            .and_then(parse_timestamp)
        {
            set.read_timestamp = Some(ts);
        }
        Ok(set)
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Timestamp the read was served at, if the server reported it.
    pub fn read_timestamp(&self) -> Option<DateTime<Utc>> {
        self.read_timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body() -> serde_json::Value {
        json!({
            "metadata": {
                "rowType": {"fields": [
                    {"name": "id", "type": {"code": "INT64"}},
                    {"name": "doc", "type": {"code": "JSON"}}
                ]},
                "transaction": {"readTimestamp": "2024-05-01T00:00:00.5Z"}
            },
            "rows": [["1", "{\"a\":1}"], ["2", null]]
        })
    }

    #[test]
    fn test_from_wire_parses_rows_and_metadata() {
        let set = ResultSet::from_wire(&body()).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.columns()[1].sql_type, SqlType::Json);
        assert_eq!(set.rows()[0].get_named("id"), Some(&Value::Int64(1)));
        assert_eq!(set.rows()[1].get_named("doc"), Some(&Value::Null));
        assert!(set.read_timestamp().is_some());
    }

    #[test]
    fn test_from_wire_rejects_ragged_rows() {
        let mut b = body();
        b["rows"] = json!([["1"]]);
        assert!(ResultSet::from_wire(&b).is_err());
    }

    #[test]
    fn test_missing_rows_is_empty_set() {
        let mut b = body();
        b.as_object_mut().unwrap().remove("rows");
        let set = ResultSet::from_wire(&b).unwrap();
        assert!(set.is_empty());
    }
}
