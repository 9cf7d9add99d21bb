//! Value and Record types - the data interchange layer between models and drivers
//!
//! A `Value` is a backend-neutral scalar; a `Record` is an ordered row of
//! named values. Models convert to and from `Record`s, drivers consume and
//! produce them.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Backend-neutral scalar value used in filters, bindings, and rows
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Json(JsonValue),
    Array(Vec<Value>),
}

impl Value {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert to a JSON value
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Int(i) => JsonValue::Number(serde_json::Number::from(*i)),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Bytes(b) => JsonValue::Array(
                b.iter()
                    .map(|&x| JsonValue::Number(serde_json::Number::from(x)))
                    .collect(),
            ),
            Value::Uuid(u) => JsonValue::String(u.to_string()),
            Value::DateTime(dt) => JsonValue::String(dt.to_rfc3339()),
            Value::Json(j) => j.clone(),
            Value::Array(arr) => JsonValue::Array(arr.iter().map(|v| v.to_json()).collect()),
        }
    }

    /// Create a Value from a JSON value.
    ///
    /// Strings are sniffed: a UUID-shaped string becomes `Uuid`, an
    /// RFC3339-shaped one becomes `DateTime`, regardless of the declared
    /// field kind. A text column holding such content is stored type-shifted
    /// and will not match a `String` equality bind; it still round-trips
    /// through `to_json` as the same string.
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::Null
                }
            }
            JsonValue::String(s) => {
                // Recover richer types that round-trip through JSON as strings
                if let Ok(uuid) = Uuid::parse_str(&s) {
                    Value::Uuid(uuid)
                } else if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
                    Value::DateTime(dt.with_timezone(&Utc))
                } else {
                    Value::String(s)
                }
            }
            JsonValue::Array(arr) => Value::Array(arr.into_iter().map(Value::from_json).collect()),
            JsonValue::Object(_) => Value::Json(json),
        }
    }

    /// Total ordering used for sort keys and aggregate comparisons.
    /// Null sorts before every other value; mismatched types compare by
    /// type tag so ordering stays total.
    pub fn compare(&self, other: &Value) -> Ordering {
        use Value::*;
        match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Int(a), Float(b)) => (*a as f64).partial_cmp(b).unwrap_or(Ordering::Equal),
            (Float(a), Int(b)) => a.partial_cmp(&(*b as f64)).unwrap_or(Ordering::Equal),
            (String(a), String(b)) => a.cmp(b),
            (Bytes(a), Bytes(b)) => a.cmp(b),
            (Uuid(a), Uuid(b)) => a.cmp(b),
            (DateTime(a), DateTime(b)) => a.cmp(b),
            (Json(a), Json(b)) => a.to_string().cmp(&b.to_string()),
            (Array(a), Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y) {
                        Ordering::Equal => continue,
                        non_eq => return non_eq,
                    }
                }
                a.len().cmp(&b.len())
            }
            (a, b) => a.type_tag().cmp(&b.type_tag()),
        }
    }

    fn type_tag(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Float(_) => 3,
            Value::String(_) => 4,
            Value::Bytes(_) => 5,
            Value::Uuid(_) => 6,
            Value::DateTime(_) => 7,
            Value::Json(_) => 8,
            Value::Array(_) => 9,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            // Bit equality keeps Eq/Hash consistent for float keys
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Int(a), Float(b)) | (Float(b), Int(a)) => (*a as f64).to_bits() == b.to_bits(),
            (String(a), String(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (Uuid(a), Uuid(b)) => a == b,
            (DateTime(a), DateTime(b)) => a == b,
            (Json(a), Json(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Int(i) => (*i as f64).to_bits().hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::Uuid(u) => u.hash(state),
            Value::DateTime(dt) => dt.hash(state),
            Value::Json(j) => j.to_string().hash(state),
            Value::Array(arr) => arr.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Uuid(u) => write!(f, "{}", u),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Json(j) => write!(f, "{}", j),
            Value::Array(arr) => {
                write!(f, "(")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        Value::Json(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

impl<T> From<Vec<T>> for Value
where
    T: Into<Value>,
    Vec<T>: ValueVec,
{
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

/// Marker to keep the blanket `Vec<T>` conversion from colliding with
/// `Vec<u8>` (bytes)
pub trait ValueVec {}
impl ValueVec for Vec<i64> {}
impl ValueVec for Vec<String> {}
impl ValueVec for Vec<Value> {}
impl ValueVec for Vec<Uuid> {}

/// An ordered row of named values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Create an empty record
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Number of columns in the record
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the record has no columns
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Get a column value by name
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Set a column value, replacing any existing value under the same name
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.fields.push((name, value));
        }
    }

    /// Remove a column by name, returning its value if present
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let idx = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(idx).1)
    }

    /// Check whether a column is present
    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    /// Iterate columns in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Column names in insertion order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Build a record from a JSON object, preserving key order
    pub fn from_json_object(json: JsonValue) -> Option<Self> {
        match json {
            JsonValue::Object(map) => {
                let mut record = Record::new();
                for (k, v) in map {
                    record.set(k, Value::from_json(v));
                }
                Some(record)
            }
            _ => None,
        }
    }

    /// Convert to a JSON object
    pub fn to_json_object(&self) -> JsonValue {
        let mut map = serde_json::Map::new();
        for (name, value) in &self.fields {
            map.insert(name.clone(), value.to_json());
        }
        JsonValue::Object(map)
    }

    /// Columns present in `self` whose values differ from `other`
    /// (or are absent there)
    pub fn diff(&self, other: &Record) -> Record {
        let mut changed = Record::new();
        for (name, value) in &self.fields {
            if other.get(name) != Some(value) {
                changed.set(name.clone(), value.clone());
            }
        }
        changed
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.set(name, value);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_preserves_scalars() {
        let values = vec![
            Value::Null,
            Value::Bool(true),
            Value::Int(42),
            Value::String("Messier 82".into()),
            Value::Array(vec![Value::Int(1), Value::Int(2)]),
        ];
        for v in values {
            assert_eq!(Value::from_json(v.to_json()), v);
        }
    }

    #[test]
    fn datetime_survives_json_round_trip() {
        let now: DateTime<Utc> = "2024-06-01T12:00:00Z".parse().unwrap();
        let v = Value::DateTime(now);
        assert_eq!(Value::from_json(v.to_json()), v);
    }

    #[test]
    fn uuid_strings_are_recovered() {
        let id = Uuid::new_v4();
        let v = Value::from_json(JsonValue::String(id.to_string()));
        assert_eq!(v, Value::Uuid(id));
    }

    #[test]
    fn timestamp_shaped_strings_coerce_but_keep_their_text_form() {
        let v = Value::from_json(JsonValue::String("2024-06-01T12:00:00+00:00".into()));
        assert!(matches!(v, Value::DateTime(_)));
        assert_ne!(v, Value::String("2024-06-01T12:00:00+00:00".into()));
        assert_eq!(
            v.to_json(),
            JsonValue::String("2024-06-01T12:00:00+00:00".into())
        );
    }

    #[test]
    fn compare_orders_null_first_and_mixes_numerics() {
        assert_eq!(Value::Null.compare(&Value::Int(0)), Ordering::Less);
        assert_eq!(Value::Int(2).compare(&Value::Float(1.5)), Ordering::Greater);
        assert_eq!(Value::Int(3).compare(&Value::Int(3)), Ordering::Equal);
    }

    #[test]
    fn record_diff_reports_changed_columns_only() {
        let mut before = Record::new();
        before.set("name", "Pluto");
        before.set("ordinal", 9i64);
        let mut after = before.clone();
        after.set("name", "Planet Nine");

        let diff = after.diff(&before);
        assert_eq!(diff.len(), 1);
        assert_eq!(diff.get("name"), Some(&Value::String("Planet Nine".into())));
    }

    #[test]
    fn record_set_replaces_in_place() {
        let mut record = Record::new();
        record.set("name", "Earth");
        record.set("name", "Terra");
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("name"), Some(&Value::String("Terra".into())));
    }
}
