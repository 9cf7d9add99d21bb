//! Migration log model
//!
//! One row per applied migration, in the reserved `loam_migrations` table.
//! The batch number groups migrations applied together so a revert can peel
//! off exactly one run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OrmError, OrmResult};
use crate::model::{FieldDef, FieldKind, IdValue, Model, ModelState};
use crate::schema::{ColumnType, Schema, SchemaStatement};

/// Reserved migration log table name
pub const MIGRATION_LOG_TABLE: &str = "loam_migrations";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationLog {
    pub id: Option<i64>,
    pub name: String,
    pub batch: i64,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    state: ModelState,
}

impl MigrationLog {
    pub fn new(name: impl Into<String>, batch: i64) -> Self {
        Self {
            id: None,
            name: name.into(),
            batch,
            created_at: None,
            state: ModelState::default(),
        }
    }
}

impl Model for MigrationLog {
    fn table_name() -> &'static str {
        MIGRATION_LOG_TABLE
    }

    fn fields() -> &'static [FieldDef] {
        const FIELDS: &[FieldDef] = &[
            FieldDef::new("id", FieldKind::Int),
            FieldDef::new("name", FieldKind::Text),
            FieldDef::new("batch", FieldKind::Int),
            FieldDef::new("created_at", FieldKind::DateTime),
        ];
        FIELDS
    }

    fn id_value(&self) -> Option<IdValue> {
        self.id.map(IdValue::from)
    }

    fn set_id(&mut self, id: IdValue) -> OrmResult<()> {
        match id.as_int() {
            Some(n) => {
                self.id = Some(n);
                Ok(())
            }
            None => Err(OrmError::Serialization(
                "migration log id must be an integer".to_string(),
            )),
        }
    }

    fn uses_timestamps() -> bool {
        true
    }

    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = Some(at);
    }

    fn state(&self) -> &ModelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModelState {
        &mut self.state
    }
}

/// Idempotent creation statement for the log table
pub(crate) fn log_table_schema() -> SchemaStatement {
    Schema::create_if_not_exists(MIGRATION_LOG_TABLE)
        .id()
        .column("name", ColumnType::Text)
        .unique()
        .column("batch", ColumnType::Int)
        .column("created_at", ColumnType::DateTime)
        .nullable()
        .build()
}
