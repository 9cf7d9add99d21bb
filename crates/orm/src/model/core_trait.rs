//! Core Model trait
//!
//! A model describes its table, field registry, identifier, and timestamp
//! columns; `to_record`/`from_record` defaults route through serde so plain
//! `#[derive(Serialize, Deserialize)]` structs get conversion for free.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{OrmError, OrmResult};
use crate::model::identifier::{IdGeneration, IdValue};
use crate::model::state::ModelState;
use crate::value::Record;

/// Scalar kind of a model field, mirroring the schema column types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Int,
    Float,
    Text,
    Bytes,
    Uuid,
    DateTime,
    Json,
}

/// One entry in a model's static field registry. Field names live in a
/// single flat key-space per model; two fields may not share a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldDef {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// A persistable entity
pub trait Model: Serialize + DeserializeOwned + Clone + Send + Sync + Sized + 'static {
    /// Storage table name
    fn table_name() -> &'static str;

    /// Static field registry
    fn fields() -> &'static [FieldDef];

    /// Primary key columns, in key order
    fn id_columns() -> &'static [&'static str] {
        &["id"]
    }

    /// How the identifier comes into existence
    fn id_generation() -> IdGeneration {
        IdGeneration::Database
    }

    /// The committed identifier, `None` while transient
    fn id_value(&self) -> Option<IdValue>;

    /// Write a generated or reconciled identifier back into the instance
    fn set_id(&mut self, id: IdValue) -> OrmResult<()>;

    /// Whether created/updated timestamps are maintained automatically
    fn uses_timestamps() -> bool {
        false
    }

    fn set_created_at(&mut self, _at: DateTime<Utc>) {}

    fn set_updated_at(&mut self, _at: DateTime<Utc>) {}

    /// Delete-timestamp column; presence opts the model into soft deletes
    fn soft_delete_column() -> Option<&'static str> {
        None
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn set_deleted_at(&mut self, _at: Option<DateTime<Utc>>) {}

    /// Persistence bookkeeping (existence flag + dirty baseline)
    fn state(&self) -> &ModelState;

    fn state_mut(&mut self) -> &mut ModelState;

    /// Convert the instance into a driver record
    fn to_record(&self) -> OrmResult<Record> {
        let json = serde_json::to_value(self)?;
        Record::from_json_object(json).ok_or_else(|| {
            OrmError::Serialization(format!(
                "model `{}` did not serialize to an object",
                Self::table_name()
            ))
        })
    }

    /// Build an instance from a driver record
    fn from_record(record: &Record) -> OrmResult<Self> {
        Ok(serde_json::from_value(record.to_json_object())?)
    }
}

/// Convert driver rows into persisted model instances. Every hydrated model
/// carries a fresh dirty baseline equal to its own serialized form.
pub fn hydrate<M: Model>(records: &[Record]) -> OrmResult<Vec<M>> {
    records
        .iter()
        .map(|record| {
            let mut model = M::from_record(record)?;
            let snapshot = model.to_record()?;
            model.state_mut().mark_persisted(snapshot);
            Ok(model)
        })
        .collect()
}
