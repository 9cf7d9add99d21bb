//! Query Builder terminal operations
//!
//! Each terminal produces exactly one backend-neutral query and hands it to
//! the driver. Aggregate terminals ignore attached eager-load directives:
//! eager loads shape fetched rows, not aggregate results.

use chrono::Utc;

use crate::error::{OrmError, OrmResult};
use crate::model::{hydrate, Model};
use crate::query::builder::QueryBuilder;
use crate::query::types::*;
use crate::value::{Record, Value};

impl<M: Model> QueryBuilder<M> {
    /// Fetch all matching models, then resolve eager-load directives
    pub async fn all(self) -> OrmResult<Vec<M>> {
        let query = self.build(QueryAction::Select)?;
        let records = self.db.execute(query).await?;
        let mut models = hydrate::<M>(&records)?;
        for loader in &self.eager {
            loader.load(&self.db, &mut models).await?;
        }
        Ok(models)
    }

    /// Fetch the first matching model
    pub async fn first(mut self) -> OrmResult<Option<M>> {
        let offset = self.range.map(|r| r.offset).unwrap_or(0);
        self.range = Some(QueryRange {
            offset,
            limit: Some(1),
        });
        Ok(self.all().await?.into_iter().next())
    }

    /// Fetch the first matching model or fail with `NotFound`
    pub async fn first_or_fail(self) -> OrmResult<M> {
        self.first()
            .await?
            .ok_or_else(|| OrmError::NotFound(M::table_name().to_string()))
    }

    /// Count matching rows
    pub async fn count(self) -> OrmResult<u64> {
        match self.aggregate(Aggregate::Count).await? {
            Value::Int(n) if n >= 0 => Ok(n as u64),
            Value::Null => Ok(0),
            other => Err(OrmError::Database(format!(
                "driver returned non-integer count: {other}"
            ))),
        }
    }

    /// Sum of a column over matching rows; `Null` when no rows match
    pub async fn sum(self, column: &str) -> OrmResult<Value> {
        self.aggregate(Aggregate::Sum(column.to_string())).await
    }

    /// Minimum of a column over matching rows
    pub async fn min(self, column: &str) -> OrmResult<Value> {
        self.aggregate(Aggregate::Min(column.to_string())).await
    }

    /// Maximum of a column over matching rows
    pub async fn max(self, column: &str) -> OrmResult<Value> {
        self.aggregate(Aggregate::Max(column.to_string())).await
    }

    /// Average of a column over matching rows
    pub async fn average(self, column: &str) -> OrmResult<Value> {
        self.aggregate(Aggregate::Average(column.to_string())).await
    }

    async fn aggregate(self, aggregate: Aggregate) -> OrmResult<Value> {
        let query = self.build(QueryAction::Aggregate(aggregate))?;
        let rows = self.db.execute(query).await?;
        Ok(rows
            .first()
            .and_then(|row| row.iter().next().map(|(_, v)| v.clone()))
            .unwrap_or(Value::Null))
    }

    /// Apply queued set-clauses to all matching rows, returning the number
    /// of affected rows. A builder with no set-clauses performs no work.
    pub async fn update(self) -> OrmResult<u64> {
        if self.sets.is_empty() {
            // Nothing to write; the terminal still validates deferred errors
            self.build(QueryAction::Update)?;
            return Ok(0);
        }
        let query = self.build(QueryAction::Update)?;
        let rows = self.db.execute(query).await?;
        Ok(read_affected(&rows))
    }

    /// Delete matching rows. Models with a delete-timestamp column are
    /// soft-deleted (the timestamp is set); others are removed outright.
    /// Query-level: lifecycle middleware does not run; use
    /// `ModelCrud::delete_all` for a middleware-routed batch delete.
    pub async fn delete(mut self) -> OrmResult<u64> {
        if let Some(column) = M::soft_delete_column() {
            self.sets = Record::new();
            self.sets.set(column, Value::DateTime(Utc::now()));
            return self.update().await;
        }
        self.force_delete().await
    }

    /// Delete matching rows outright, bypassing soft-delete semantics
    pub async fn force_delete(self) -> OrmResult<u64> {
        let query = self.build(QueryAction::Delete)?;
        let rows = self.db.execute(query).await?;
        Ok(read_affected(&rows))
    }
}

/// Read the affected-row count from a driver acknowledgement
pub(crate) fn read_affected(rows: &[Record]) -> u64 {
    match rows.first().and_then(|row| row.iter().next()) {
        Some((_, Value::Int(n))) if *n >= 0 => *n as u64,
        _ => 0,
    }
}
