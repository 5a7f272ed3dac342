//! Write request builder.
//!
//! Building a write casts every value for the wire, raises the
//! [`MutationEvent`] and only then hands back a [`WriteRequest`]. A vetoed
//! write never produces a request, so nothing can reach the server.

use serde_json::json;
use spanmodel_core::{Error, Result, SqlType, Value};

use crate::cast::{ColumnKind, cast_column_on_write};
use crate::events::{MutationCommand, MutationEvent, MutationObservers};

/// Fluent builder for a single-row [`WriteRequest`].
///
/// # Example
///
/// ```ignore
/// let request = WriteBuilder::insert("Singers")
///     .set("SingerId", 1)
///     .set_json("Prefs", r#"{"theme":"dark"}"#)
///     .build(&observers)?;
/// ```
#[derive(Debug, Clone)]
pub struct WriteBuilder {
    table: String,
    command: MutationCommand,
    columns: Vec<(String, ColumnKind, Value)>,
}

impl WriteBuilder {
    pub fn new(table: impl Into<String>, command: MutationCommand) -> Self {
        Self {
            table: table.into(),
            command,
            columns: Vec::new(),
        }
    }

    pub fn insert(table: impl Into<String>) -> Self {
        Self::new(table, MutationCommand::Insert)
    }

    pub fn update(table: impl Into<String>) -> Self {
        Self::new(table, MutationCommand::Update)
    }

    /// Delete by key: set the key columns only.
    pub fn delete(table: impl Into<String>) -> Self {
        Self::new(table, MutationCommand::Delete)
    }

    pub fn upsert(table: impl Into<String>) -> Self {
        Self::new(table, MutationCommand::Upsert)
    }

    /// Set a column. The cast kind follows the value: a [`Value::Json`]
    /// is written as JSON, everything else passes through.
    #[must_use]
    pub fn set(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        let kind = value
            .sql_type()
            .as_ref()
            .map_or(ColumnKind::Plain, ColumnKind::for_sql_type);
        self.set_typed(column, kind, value)
    }

    /// Set a JSON column. Text is taken as JSON content, not as a string.
    #[must_use]
    pub fn set_json(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_typed(column, ColumnKind::Json, value)
    }

    /// Set a column with an explicit cast kind.
    #[must_use]
    pub fn set_typed(
        mut self,
        column: impl Into<String>,
        kind: ColumnKind,
        value: impl Into<Value>,
    ) -> Self {
        let column = column.into();
        let value = value.into();
        if let Some(slot) = self.columns.iter_mut().find(|(name, _, _)| *name == column) {
            *slot = (column, kind, value);
        } else {
            self.columns.push((column, kind, value));
        }
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn command(&self) -> MutationCommand {
        self.command
    }

    /// Cast the values, notify `observers`, and produce the request.
    ///
    /// Fails with `UnsupportedCastInput` before any observer runs if a value
    /// cannot be cast, and with `MutationRejected` if an observer vetoes.
    /// [`ColumnKind::InterleaveKey`] columns are accepted on deletes only.
    #[tracing::instrument(
        level = "debug",
        skip(self, observers),
        fields(table = %self.table, command = %self.command)
    )]
    pub fn build(&self, observers: &MutationObservers) -> Result<WriteRequest> {
        if self.table.is_empty() {
            return Err(Error::Custom("write requires a table name".to_string()));
        }
        if self.columns.is_empty() {
            return Err(Error::Custom(format!(
                "{} on {} sets no columns",
                self.command, self.table
            )));
        }

        // Row mutations name each key column; only a key set takes the
        // composite form.
        if let Some((name, _, _)) = self.columns.iter().find(|(_, kind, _)| {
            *kind == ColumnKind::InterleaveKey && self.command != MutationCommand::Delete
        }) {
            return Err(Error::Custom(format!(
                "{} on {}: interleaved key column {} only addresses deletes; set its parts as separate columns",
                self.command, self.table, name
            )));
        }

        let mut values = Vec::with_capacity(self.columns.len());
        let mut types = Vec::with_capacity(self.columns.len());
        for (name, kind, value) in &self.columns {
            let cast = cast_column_on_write(*kind, value.clone())?;
            types.push(match kind {
                ColumnKind::Json => Some(SqlType::Json),
                _ => cast.sql_type(),
            });
            values.push((name.clone(), cast));
        }

        let event = MutationEvent::new(self.table.clone(), self.command, values);
        observers.dispatch(&event)?;
        tracing::debug!(columns = event.values.len(), "Write request built");

        Ok(WriteRequest {
            table: event.table,
            command: event.command,
            values: event.values,
            types,
        })
    }
}

/// A cast, observed write ready for commit.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    table: String,
    command: MutationCommand,
    values: Vec<(String, Value)>,
    types: Vec<Option<SqlType>>,
}

impl WriteRequest {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn command(&self) -> MutationCommand {
        self.command
    }

    pub fn values(&self) -> &[(String, Value)] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Wire type of each column, in column order. `None` for an untyped NULL.
    pub fn column_types(&self) -> &[Option<SqlType>] {
        &self.types
    }

    /// Render as a `Mutation` message.
    ///
    /// Deletes address their row through a `KeySet`; an interleaved key
    /// column contributes all of its parts.
    pub fn to_wire(&self) -> serde_json::Value {
        let columns: Vec<&str> = self.values.iter().map(|(name, _)| name.as_str()).collect();
        let body = match self.command {
            MutationCommand::Delete => {
                let mut key = Vec::new();
                for (_, value) in &self.values {
                    match value {
                        Value::Array(parts) => key.extend(parts.iter().map(Value::to_wire)),
                        other => key.push(other.to_wire()),
                    }
                }
                json!({
                    "table": self.table,
                    "keySet": { "keys": [key] },
                })
            }
            _ => {
                let row: Vec<serde_json::Value> =
                    self.values.iter().map(|(_, value)| value.to_wire()).collect();
                json!({
                    "table": self.table,
                    "columns": columns,
                    "values": [row],
                })
            }
        };
        let mut mutation = serde_json::Map::new();
        mutation.insert(self.command.wire_key().to_string(), body);
        serde_json::Value::Object(mutation)
    }
}

/// Build a write from already-typed values, raising the mutation event first.
pub fn build_write_request(
    table: &str,
    command: MutationCommand,
    values: Vec<(String, Value)>,
    observers: &MutationObservers,
) -> Result<WriteRequest> {
    values
        .into_iter()
        .fold(WriteBuilder::new(table, command), |builder, (column, value)| {
            builder.set(column, value)
        })
        .build(observers)
}
