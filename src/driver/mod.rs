// Driver boundary
// A driver opens connections, a connection prepares statements and a
// prepared statement executes into a `Statement` holding its result.
// Drivers report failures as plain `anyhow` errors; `Database` decides
// which phase of a query they belong to.

pub mod memory;

pub use memory::MemoryDriver;

use crate::storage::{Row, Value};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opens connections from a connection string
pub trait Driver: Send + Sync {
    fn connect(&self, dsn: &str, options: &ConnectOptions) -> Result<Box<dyn Connection>>;
}

/// A live connection to one database
pub trait Connection: Send {
    /// Compile `sql` without running it
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn PreparedStatement>>;
}

/// A compiled statement waiting for its parameters
pub trait PreparedStatement: Send {
    fn sql(&self) -> &str;

    /// Bind `params` and run the statement once
    fn execute(self: Box<Self>, params: &Params) -> Result<Statement>;
}

/// Credentials and driver options used to open a connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// Values bound to a statement's placeholders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Params {
    /// Bound in order to `?` and by position to `$1`, `$2`, ...
    Positional(Vec<Value>),
    /// Bound by name to `:name` and `$name`
    Named(BTreeMap<String, Value>),
}

impl Default for Params {
    fn default() -> Self {
        Params::Positional(Vec::new())
    }
}

impl Params {
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Params::Positional(values.into_iter().map(Into::into).collect())
    }

    pub fn named<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Params::Named(
            values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        match self {
            Params::Positional(values) => values.len(),
            Params::Named(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build params from a JSON array (positional) or object (named)
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Null => Ok(Params::default()),
            serde_json::Value::Array(values) => values
                .iter()
                .map(Value::from_json)
                .collect::<Result<Vec<_>>>()
                .map(Params::Positional),
            serde_json::Value::Object(values) => values
                .iter()
                .map(|(k, v)| Ok((k.clone(), Value::from_json(v)?)))
                .collect::<Result<BTreeMap<_, _>>>()
                .map(Params::Named),
            other => Err(anyhow::anyhow!(
                "Parameters must be a JSON array or object, got {}",
                other
            )),
        }
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Params::Positional(values)
    }
}

impl From<BTreeMap<String, Value>> for Params {
    fn from(values: BTreeMap<String, Value>) -> Self {
        Params::Named(values)
    }
}

/// An executed statement and its result set
///
/// Rows are read through a forward-only cursor. Hooks only ever see a
/// shared reference, so they can inspect the result but not consume it.
#[derive(Debug, Clone)]
pub struct Statement {
    sql: String,
    params: Params,
    columns: Vec<String>,
    rows: Vec<Row>,
    rows_affected: usize,
    cursor: usize,
}

impl Statement {
    pub fn new(
        sql: impl Into<String>,
        params: Params,
        columns: Vec<String>,
        rows: Vec<Row>,
        rows_affected: usize,
    ) -> Self {
        Self {
            sql: sql.into(),
            params,
            columns,
            rows,
            rows_affected,
            cursor: 0,
        }
    }

    /// The SQL text that was executed
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// The parameters the statement was executed with
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows in the result set
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Rows written by an INSERT, UPDATE or DELETE
    pub fn rows_affected(&self) -> usize {
        self.rows_affected
    }

    /// Every row of the result set, regardless of the cursor
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Rows not fetched yet
    pub fn remaining(&self) -> usize {
        self.rows.len() - self.cursor
    }

    /// Fetch the next row
    pub fn fetch(&mut self) -> Option<Row> {
        let row = self.rows.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(row)
    }

    /// Fetch every remaining row
    pub fn fetch_all(&mut self) -> Vec<Row> {
        let rows = self.rows[self.cursor..].to_vec();
        self.cursor = self.rows.len();
        rows
    }
}

impl Iterator for Statement {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.fetch()
    }
}
