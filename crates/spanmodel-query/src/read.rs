//! Read request builder.
//!
//! A read names a table, the columns to return, and which rows to return. It
//! is dispatched through the `Read` RPC when rows are selected by key, or
//! through `ExecuteSql` when they are selected by a SQL condition (or when no
//! columns are named and the whole table is read). Either way
//! it runs in a single-use read-only transaction carrying the read's
//! [`TimestampBound`].
//!
//! # Example
//!
//! ```ignore
//! let request = ReadBuilder::new("Singers")
//!     .columns(&["SingerId", "FirstName"])
//!     .filter("LastName = @last")
//!     .bind("last", "Lovelace")
//!     .with_staleness(TimestampBound::exact_staleness(TimeDelta::seconds(15))?)
//!     .build()?;
//! ```

use serde_json::{Map, json};
use spanmodel_core::{Error, Result, Value};

use crate::bound::TimestampBound;
use crate::stale::SupportsStaleReads;

/// Which rows a read returns.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ReadPredicate {
    /// Every row of the table (or index).
    #[default]
    All,
    /// Rows whose primary key (or index key) matches one of the given keys.
    Keys(Vec<Vec<Value>>),
    /// Rows matching a SQL condition with `@name` parameters.
    Where {
        sql: String,
        params: Vec<(String, Value)>,
    },
}

impl ReadPredicate {
    pub fn filter(sql: impl Into<String>) -> Self {
        ReadPredicate::Where {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// True for a SQL condition, which always goes through `ExecuteSql`.
    pub const fn is_sql(&self) -> bool {
        matches!(self, ReadPredicate::Where { .. })
    }
}

/// Fluent builder for a [`ReadRequest`].
#[derive(Debug, Clone, Default)]
pub struct ReadBuilder {
    table: String,
    columns: Vec<String>,
    predicate: ReadPredicate,
    index: Option<String>,
    limit: Option<u64>,
    staleness: Option<TimestampBound>,
}

impl ReadBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Replace the selected columns.
    #[must_use]
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| (*c).to_string()).collect();
        self
    }

    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    #[must_use]
    pub fn predicate(mut self, predicate: ReadPredicate) -> Self {
        self.predicate = predicate;
        self
    }

    /// Select a row by key. Repeated calls select several rows.
    #[must_use]
    pub fn key(mut self, key: Vec<Value>) -> Self {
        match &mut self.predicate {
            ReadPredicate::Keys(keys) => keys.push(key),
            _ => self.predicate = ReadPredicate::Keys(vec![key]),
        }
        self
    }

    /// Select rows by SQL condition, replacing any key selection.
    #[must_use]
    pub fn filter(mut self, sql: impl Into<String>) -> Self {
        let params = match std::mem::take(&mut self.predicate) {
            ReadPredicate::Where { params, .. } => params,
            _ => Vec::new(),
        };
        self.predicate = ReadPredicate::Where {
            sql: sql.into(),
            params,
        };
        self
    }

    /// Bind a `@name` parameter of the SQL condition.
    ///
    /// Ignored unless the read is filtered; binding before [`filter`](Self::filter)
    /// is fine.
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let (name, value) = (name.into(), value.into());
        match &mut self.predicate {
            ReadPredicate::Where { params, .. } => params.push((name, value)),
            _ => {
                self.predicate = ReadPredicate::Where {
                    sql: String::new(),
                    params: vec![(name, value)],
                };
            }
        }
        self
    }

    /// Read through a secondary index.
    #[must_use]
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Freeze the builder into a request carrying its effective bound.
    pub fn build(&self) -> Result<ReadRequest> {
        if self.table.is_empty() {
            return Err(Error::Custom("read requires a table name".to_string()));
        }
        match &self.predicate {
            ReadPredicate::Where { sql, .. } if sql.trim().is_empty() => {
                return Err(Error::Custom(format!(
                    "read of {} has parameters but no condition",
                    self.table
                )));
            }
            ReadPredicate::Keys(_) if self.columns.is_empty() => {
                return Err(Error::Custom(format!(
                    "read of {} by key needs explicit columns",
                    self.table
                )));
            }
            _ => {}
        }
        Ok(ReadRequest {
            table: self.table.clone(),
            columns: self.columns.clone(),
            predicate: self.predicate.clone(),
            index: self.index.clone(),
            limit: self.limit,
            bound: self.effective_bound(),
        })
    }
}

impl SupportsStaleReads for ReadBuilder {
    fn set_staleness(&mut self, bound: TimestampBound) {
        self.staleness = Some(bound);
    }

    fn clear_staleness(&mut self) {
        self.staleness = None;
    }

    fn staleness(&self) -> Option<&TimestampBound> {
        self.staleness.as_ref()
    }
}

/// A read ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    table: String,
    columns: Vec<String>,
    predicate: ReadPredicate,
    index: Option<String>,
    limit: Option<u64>,
    bound: TimestampBound,
}

impl ReadRequest {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn predicate(&self) -> &ReadPredicate {
        &self.predicate
    }

    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn bound(&self) -> &TimestampBound {
        &self.bound
    }

    /// True when this request goes through `ExecuteSql`. A full-table read
    /// with no explicit columns becomes `SELECT *`.
    pub fn is_sql(&self) -> bool {
        match self.predicate {
            ReadPredicate::Where { .. } => true,
            ReadPredicate::All => self.columns.is_empty(),
            ReadPredicate::Keys(_) => false,
        }
    }

    /// Render the request body for `session` (a full session name).
    pub fn to_wire(&self, session: &str, return_read_timestamp: bool) -> serde_json::Value {
        let transaction = json!({
            "singleUse": { "readOnly": self.bound.to_read_only_options(return_read_timestamp) }
        });
        match &self.predicate {
            ReadPredicate::All if self.is_sql() => json!({
                "session": session,
                "sql": self.to_sql(None),
                "transaction": transaction,
            }),
            ReadPredicate::Where { sql, params } => {
                let mut body = json!({
                    "session": session,
                    "sql": self.to_sql(Some(sql)),
                    "transaction": transaction,
                });
                if !params.is_empty() {
                    let mut values = Map::new();
                    let mut types = Map::new();
                    for (name, value) in params {
                        values.insert(name.clone(), value.to_wire());
                        if let Some(ty) = value.sql_type() {
                            types.insert(name.clone(), ty.to_type_json());
                        }
                    }
                    body["params"] = serde_json::Value::Object(values);
                    body["paramTypes"] = serde_json::Value::Object(types);
                }
                body
            }
            predicate => {
                let key_set = match predicate {
                    ReadPredicate::Keys(keys) => json!({
                        "keys": keys
                            .iter()
                            .map(|key| key.iter().map(Value::to_wire).collect::<Vec<_>>())
                            .collect::<Vec<_>>()
                    }),
                    _ => json!({ "all": true }),
                };
                let mut body = json!({
                    "session": session,
                    "table": self.table,
                    "columns": self.columns,
                    "keySet": key_set,
                    "transaction": transaction,
                });
                if let Some(index) = &self.index {
                    body["index"] = json!(index);
                }
                if let Some(limit) = self.limit {
                    body["limit"] = json!(limit.to_string());
                }
                body
            }
        }
    }

    fn to_sql(&self, condition: Option<&str>) -> String {
        let projection = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let source = match &self.index {
            Some(index) => format!(
                "{}@{{FORCE_INDEX={}}}",
                quote_ident(&self.table),
                quote_ident(index)
            ),
            None => quote_ident(&self.table),
        };
        let mut sql = format!("SELECT {} FROM {}", projection, source);
        if let Some(condition) = condition {
            sql.push_str(" WHERE ");
            sql.push_str(condition);
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        sql
    }
}

/// Build a `SELECT *` read of `table` under `bound`; `None` reads strongly.
///
/// Key predicates need explicit columns, so use [`ReadBuilder`] for those.
pub fn build_read_request(
    table: &str,
    predicate: ReadPredicate,
    bound: Option<TimestampBound>,
) -> Result<ReadRequest> {
    let mut builder = ReadBuilder::new(table).predicate(predicate);
    if let Some(bound) = bound {
        builder.set_staleness(bound);
    }
    builder.build()
}

fn quote_ident(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}
