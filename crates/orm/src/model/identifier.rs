//! Model identifiers
//!
//! An identifier is a tagged sum over the two key shapes a model can have:
//! a single value or a named tuple of values. Filter and join code branch on
//! the shape exactly once, at the point the identifier is expanded.

use std::fmt;

use uuid::Uuid;

use crate::value::{Record, Value};

/// How a model's identifier comes into existence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdGeneration {
    /// The caller supplies the id before `create`
    None,
    /// The engine generates a random UUID client-side on `create`
    Random,
    /// The backend generates the id; `create` reconciles it from the
    /// driver's acknowledgement
    Database,
}

/// A model identifier: a single value or a composite of named parts
#[derive(Debug, Clone, PartialEq)]
pub enum IdValue {
    Simple(Value),
    Composite(Vec<(String, Value)>),
}

impl IdValue {
    /// A composite built from (column, value) pairs
    pub fn composite(parts: Vec<(impl Into<String>, impl Into<Value>)>) -> Self {
        IdValue::Composite(
            parts
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }

    /// Whether any component of the identifier is null
    pub fn has_null(&self) -> bool {
        match self {
            IdValue::Simple(value) => value.is_null(),
            IdValue::Composite(parts) => parts.iter().any(|(_, v)| v.is_null()),
        }
    }

    /// Read the identifier out of a record by key columns. `None` when any
    /// key column is absent or null.
    pub fn from_record(record: &Record, columns: &[&str]) -> Option<Self> {
        if columns.len() == 1 {
            let value = record.get(columns[0])?;
            if value.is_null() {
                return None;
            }
            return Some(IdValue::Simple(value.clone()));
        }
        let mut parts = Vec::with_capacity(columns.len());
        for column in columns {
            let value = record.get(column)?;
            if value.is_null() {
                return None;
            }
            parts.push((column.to_string(), value.clone()));
        }
        Some(IdValue::Composite(parts))
    }

    /// Expand the identifier into values ordered by the given key columns.
    /// `None` when a composite is missing a named component or the shape
    /// does not match the column count.
    pub fn ordered_values(&self, columns: &[&str]) -> Option<Vec<Value>> {
        match self {
            IdValue::Simple(value) => {
                if columns.len() == 1 {
                    Some(vec![value.clone()])
                } else {
                    None
                }
            }
            IdValue::Composite(parts) => columns
                .iter()
                .map(|column| {
                    parts
                        .iter()
                        .find(|(name, _)| name == column)
                        .map(|(_, v)| v.clone())
                })
                .collect(),
        }
    }

    /// The simple value, if this is a simple identifier
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            IdValue::Simple(value) => Some(value),
            IdValue::Composite(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.as_value() {
            Some(Value::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self.as_value() {
            Some(Value::Uuid(u)) => Some(*u),
            _ => None,
        }
    }
}

impl fmt::Display for IdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdValue::Simple(value) => write!(f, "{value}"),
            IdValue::Composite(parts) => {
                write!(f, "(")?;
                for (i, (name, value)) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}={value}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<i64> for IdValue {
    fn from(v: i64) -> Self {
        IdValue::Simple(Value::Int(v))
    }
}

impl From<i32> for IdValue {
    fn from(v: i32) -> Self {
        IdValue::Simple(Value::Int(v as i64))
    }
}

impl From<Uuid> for IdValue {
    fn from(v: Uuid) -> Self {
        IdValue::Simple(Value::Uuid(v))
    }
}

impl From<&str> for IdValue {
    fn from(v: &str) -> Self {
        IdValue::Simple(Value::String(v.to_string()))
    }
}

impl From<Value> for IdValue {
    fn from(v: Value) -> Self {
        IdValue::Simple(v)
    }
}
