// Storage module - rows, values and table schemas
// The in-memory engine behind the bundled driver keeps its data here

pub mod btree;
pub mod page;
pub mod table;

use serde::{Deserialize, Serialize};

/// A single result or table row, one `Value` per column
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Get the value at a column position
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A stored or bound value
///
/// Floats are kept in thousandths so that `Value` stays `Eq` and can key
/// the B-tree indexes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(i64),
    Text(String),
    Boolean(bool),
}

impl Value {
    /// Build a float value from its natural representation
    pub fn float(value: f64) -> Self {
        Value::Float((value * 1000.0).round() as i64)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Compare two values of the same type (used by indexes)
    pub fn compare(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::Null, Value::Null) => Some(std::cmp::Ordering::Equal),
            _ => None,
        }
    }

    /// Whether this value may be stored in a column of `data_type`
    pub fn fits(&self, data_type: &DataType) -> bool {
        matches!(
            (self, data_type),
            (Value::Null, _)
                | (Value::Integer(_), DataType::Integer)
                | (Value::Integer(_), DataType::Float)
                | (Value::Float(_), DataType::Float)
                | (Value::Text(_), DataType::Text)
                | (Value::Boolean(_), DataType::Boolean)
        )
    }

    /// Convert into the representation used by a column of `data_type`
    pub fn coerce(self, data_type: &DataType) -> Value {
        match (self, data_type) {
            (Value::Integer(i), DataType::Float) => Value::Float(i * 1000),
            (value, _) => value,
        }
    }

    /// Convert a JSON scalar into a value
    pub fn from_json(json: &serde_json::Value) -> anyhow::Result<Value> {
        match json {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Boolean(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::Integer(i)),
                None => n
                    .as_f64()
                    .map(Value::float)
                    .ok_or_else(|| anyhow::anyhow!("Unsupported number: {}", n)),
            },
            serde_json::Value::String(s) => Ok(Value::Text(s.clone())),
            other => Err(anyhow::anyhow!("Unsupported parameter value: {}", other)),
        }
    }

    /// Convert into a JSON scalar
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f as f64 / 1000.0),
            Value::Text(s) => serde_json::Value::from(s.as_str()),
            Value::Boolean(b) => serde_json::Value::from(*b),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", (*v as f64) / 1000.0),
            Value::Text(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Column definitions of a table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schema {
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub primary_key: bool,
    pub nullable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DataType {
    Integer,
    Float,
    Text,
    Boolean,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Find the position of a column by name
    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col.name == name)
    }

    /// Get the primary key column position
    pub fn get_primary_key_index(&self) -> Option<usize> {
        self.columns.iter().position(|col| col.primary_key)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}
