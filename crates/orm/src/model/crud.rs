//! CRUD surface
//!
//! Blanket extension over every model: static entry points for queries and
//! creation, instance methods for save/update/delete/restore. All writes go
//! through the lifecycle coordinator and its middleware chain.

use async_trait::async_trait;

use crate::database::Database;
use crate::error::{OrmError, OrmResult};
use crate::model::core_trait::Model;
use crate::model::identifier::IdValue;
use crate::model::lifecycle;
use crate::query::QueryBuilder;

#[async_trait]
pub trait ModelCrud: Model {
    /// Start a query builder for this model
    fn query(db: &Database) -> QueryBuilder<Self> {
        db.query()
    }

    /// Look up a model by identifier; soft-deleted rows are not found
    async fn find<I>(db: &Database, id: I) -> OrmResult<Option<Self>>
    where
        I: Into<IdValue> + Send,
    {
        Self::query(db).filter_id(&id.into()).first().await
    }

    /// Look up a model by identifier or fail with `NotFound`
    async fn find_or_fail<I>(db: &Database, id: I) -> OrmResult<Self>
    where
        I: Into<IdValue> + Send,
    {
        Self::find(db, id)
            .await?
            .ok_or_else(|| OrmError::NotFound(Self::table_name().to_string()))
    }

    /// Insert a new model, returning it with its committed identifier and
    /// a clean dirty baseline
    async fn create(db: &Database, mut model: Self) -> OrmResult<Self> {
        lifecycle::persist_new(db, &mut model).await?;
        Ok(model)
    }

    /// Insert a batch of models with a single bulk driver write. Middleware
    /// runs per item; any veto aborts the whole batch.
    async fn create_all(db: &Database, models: Vec<Self>) -> OrmResult<Vec<Self>> {
        lifecycle::persist_new_batch(db, models).await
    }

    /// Delete a batch of models with a single bulk driver write: soft when
    /// the model carries a delete-timestamp column, hard otherwise.
    /// Middleware runs per item; any veto aborts the whole batch.
    async fn delete_all(db: &Database, models: Vec<Self>) -> OrmResult<Vec<Self>> {
        lifecycle::remove_batch(db, models, false).await
    }

    /// Insert or update depending on whether the model is persisted
    async fn save(&mut self, db: &Database) -> OrmResult<()> {
        if self.state().exists() {
            lifecycle::persist_update(db, self).await
        } else {
            lifecycle::persist_new(db, self).await
        }
    }

    /// Write the dirty diff; a clean model performs no driver call
    async fn update(&mut self, db: &Database) -> OrmResult<()> {
        lifecycle::persist_update(db, self).await
    }

    /// Delete the model: soft when it carries a delete-timestamp column,
    /// hard otherwise
    async fn delete(&mut self, db: &Database) -> OrmResult<()> {
        lifecycle::remove(db, self, false).await
    }

    /// Delete the stored row outright, bypassing soft-delete semantics
    async fn force_delete(&mut self, db: &Database) -> OrmResult<()> {
        lifecycle::remove(db, self, true).await
    }

    /// Clear the delete timestamp of a soft-deleted model
    async fn restore(&mut self, db: &Database) -> OrmResult<()> {
        lifecycle::restore(db, self).await
    }
}

#[async_trait]
impl<M: Model> ModelCrud for M {}
