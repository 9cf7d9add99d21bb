//! Lifecycle coordinator
//!
//! Drives the Transient -> Persisted -> Dirty -> SoftDeleted state machine.
//! Every write runs through the model's middleware chain; the terminal at
//! the end of the chain performs the actual driver call. Dirty detection is
//! re-evaluated inside the terminal so field edits made by middleware on the
//! way in are part of the written diff.

use async_trait::async_trait;
use chrono::Utc;
use tokio::task::JoinSet;
use tracing::debug;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{IdentifierError, OrmError, OrmResult};
use crate::middleware::{LifecycleEvent, Terminal};
use crate::model::core_trait::Model;
use crate::model::identifier::{IdGeneration, IdValue};
use crate::query::{Filter, FilterOp, Query, QueryAction};
use crate::value::{Record, Value};

/// Insert a transient model and mark it persisted
pub(crate) async fn persist_new<M: Model>(db: &Database, model: &mut M) -> OrmResult<()> {
    prepare_for_insert(model)?;
    let terminal = InsertTerminal { db: db.clone() };
    db.middleware()
        .run(LifecycleEvent::Create, model, &terminal)
        .await
}

/// Insert a batch with one bulk driver write. Middleware runs per item,
/// fanned out on a join set; any veto aborts the whole batch before
/// anything is written.
pub(crate) async fn persist_new_batch<M: Model>(
    db: &Database,
    models: Vec<M>,
) -> OrmResult<Vec<M>> {
    if models.is_empty() {
        return Ok(Vec::new());
    }
    let count = models.len();
    let mut tasks: JoinSet<OrmResult<(usize, M)>> = JoinSet::new();
    for (index, mut model) in models.into_iter().enumerate() {
        let db = db.clone();
        tasks.spawn(async move {
            prepare_for_insert(&mut model)?;
            // Preprocessing only: the bulk write happens after the join point
            db.middleware()
                .run(LifecycleEvent::Create, &mut model, &NoopTerminal)
                .await?;
            Ok((index, model))
        });
    }

    let mut slots: Vec<Option<M>> = (0..count).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        let (index, model) =
            joined.map_err(|e| OrmError::Database(format!("batch task failed: {e}")))??;
        slots[index] = Some(model);
    }
    let mut models: Vec<M> = slots
        .into_iter()
        .collect::<Option<Vec<M>>>()
        .ok_or_else(|| OrmError::Database("batch task produced no model".into()))?;

    let records = models
        .iter()
        .map(insert_record::<M>)
        .collect::<OrmResult<Vec<Record>>>()?;
    let acks = db.execute(Query::insert(M::table_name(), records)).await?;
    for (i, model) in models.iter_mut().enumerate() {
        reconcile_id(model, acks.get(i))?;
        let snapshot = model.to_record()?;
        model.state_mut().mark_persisted(snapshot);
    }
    Ok(models)
}

/// Delete a batch with one bulk driver write: soft when the model carries a
/// delete-timestamp column and `force` is false, hard otherwise. Middleware
/// runs per item, fanned out on a join set; any veto aborts the whole batch
/// before anything is written.
pub(crate) async fn remove_batch<M: Model>(
    db: &Database,
    models: Vec<M>,
    force: bool,
) -> OrmResult<Vec<M>> {
    if models.is_empty() {
        return Ok(Vec::new());
    }
    let soft_column = if force { None } else { M::soft_delete_column() };
    let event = if soft_column.is_some() {
        LifecycleEvent::SoftDelete
    } else {
        LifecycleEvent::Delete
    };

    let mut ids = Vec::with_capacity(models.len());
    for model in &models {
        ids.push(committed_id(model)?);
    }

    let count = models.len();
    let mut tasks: JoinSet<OrmResult<(usize, M)>> = JoinSet::new();
    for (index, mut model) in models.into_iter().enumerate() {
        let db = db.clone();
        tasks.spawn(async move {
            // Preprocessing only: the bulk write happens after the join point
            db.middleware().run(event, &mut model, &NoopTerminal).await?;
            Ok((index, model))
        });
    }

    let mut slots: Vec<Option<M>> = (0..count).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        let (index, model) =
            joined.map_err(|e| OrmError::Database(format!("batch task failed: {e}")))??;
        slots[index] = Some(model);
    }
    let mut models: Vec<M> = slots
        .into_iter()
        .collect::<Option<Vec<M>>>()
        .ok_or_else(|| OrmError::Database("batch task produced no model".into()))?;

    let filter = ids_filter::<M>(&ids)?;
    match soft_column {
        Some(column) => {
            let now = Utc::now();
            let mut query = Query::new(M::table_name(), QueryAction::Update);
            query.filter = Some(filter);
            let mut sets = Record::new();
            sets.set(column, Value::DateTime(now));
            query.input = vec![sets];
            db.execute(query).await?;
            for model in models.iter_mut() {
                model.set_deleted_at(Some(now));
                let snapshot = model.to_record()?;
                model.state_mut().mark_persisted(snapshot);
            }
        }
        None => {
            let mut query = Query::new(M::table_name(), QueryAction::Delete);
            query.filter = Some(filter);
            db.execute(query).await?;
            for model in models.iter_mut() {
                model.state_mut().mark_removed();
            }
        }
    }
    Ok(models)
}

/// Write the dirty diff of a persisted model. A clean model is a
/// zero-driver-call no-op.
pub(crate) async fn persist_update<M: Model>(db: &Database, model: &mut M) -> OrmResult<()> {
    let id = committed_id(model)?;
    if dirty_diff(model)?.is_empty() {
        debug!(table = M::table_name(), "update skipped, no dirty fields");
        return Ok(());
    }
    if M::uses_timestamps() {
        model.set_updated_at(Utc::now());
    }
    let terminal = UpdateTerminal { db: db.clone(), id };
    db.middleware()
        .run(LifecycleEvent::Update, model, &terminal)
        .await
}

/// Delete a persisted model. Soft when the model carries a delete-timestamp
/// column and `force` is false; hard otherwise.
pub(crate) async fn remove<M: Model>(db: &Database, model: &mut M, force: bool) -> OrmResult<()> {
    let id = committed_id(model)?;
    if let (Some(column), false) = (M::soft_delete_column(), force) {
        let terminal = SoftDeleteTerminal {
            db: db.clone(),
            id,
            column,
        };
        return db
            .middleware()
            .run(LifecycleEvent::SoftDelete, model, &terminal)
            .await;
    }
    let terminal = HardDeleteTerminal { db: db.clone(), id };
    db.middleware()
        .run(LifecycleEvent::Delete, model, &terminal)
        .await
}

/// Clear the delete timestamp of a soft-deleted model
pub(crate) async fn restore<M: Model>(db: &Database, model: &mut M) -> OrmResult<()> {
    let column = M::soft_delete_column().ok_or_else(|| {
        OrmError::Query(format!(
            "model `{}` does not support soft deletes",
            M::table_name()
        ))
    })?;
    let id = model.id_value().ok_or(IdentifierError::IdRequired)?;
    if model.deleted_at().is_none() {
        return Err(OrmError::Query(
            "restore requires a soft-deleted row".to_string(),
        ));
    }
    let terminal = RestoreTerminal {
        db: db.clone(),
        id,
        column,
    };
    db.middleware()
        .run(LifecycleEvent::Restore, model, &terminal)
        .await
}

fn committed_id<M: Model>(model: &M) -> OrmResult<IdValue> {
    if !model.state().exists() {
        return Err(IdentifierError::IdRequired.into());
    }
    model
        .id_value()
        .ok_or_else(|| IdentifierError::IdRequired.into())
}

fn prepare_for_insert<M: Model>(model: &mut M) -> OrmResult<()> {
    match M::id_generation() {
        IdGeneration::Random => {
            if model.id_value().is_none() {
                model.set_id(IdValue::Simple(Value::Uuid(Uuid::new_v4())))?;
            }
        }
        IdGeneration::None => {
            if model.id_value().is_none() {
                return Err(IdentifierError::IdRequired.into());
            }
        }
        IdGeneration::Database => {}
    }
    if M::uses_timestamps() {
        let now = Utc::now();
        model.set_created_at(now);
        model.set_updated_at(now);
    }
    Ok(())
}

/// The row sent on insert: the full field set, minus key columns the
/// backend is expected to generate
fn insert_record<M: Model>(model: &M) -> OrmResult<Record> {
    let mut record = model.to_record()?;
    if M::id_generation() == IdGeneration::Database && model.id_value().is_none() {
        for column in M::id_columns() {
            if record.get(column).map(|v| v.is_null()).unwrap_or(false) {
                record.remove(column);
            }
        }
    }
    Ok(record)
}

fn reconcile_id<M: Model>(model: &mut M, ack: Option<&Record>) -> OrmResult<()> {
    if M::id_generation() != IdGeneration::Database || model.id_value().is_some() {
        return Ok(());
    }
    if let Some(ack) = ack {
        if let Some(id) = IdValue::from_record(ack, M::id_columns()) {
            model.set_id(id)?;
        }
    }
    Ok(())
}

fn dirty_diff<M: Model>(model: &M) -> OrmResult<Record> {
    let current = model.to_record()?;
    let baseline = model.state().snapshot().cloned().unwrap_or_default();
    let mut dirty = current.diff(&baseline);
    for column in M::id_columns() {
        dirty.remove(column);
    }
    Ok(dirty)
}

/// One filter matching every identifier in the batch
fn ids_filter<M: Model>(ids: &[IdValue]) -> OrmResult<Filter> {
    let mut per_id = Vec::with_capacity(ids.len());
    for id in ids {
        per_id.push(id.to_filter(M::id_columns())?);
    }
    Filter::group(FilterOp::Or, per_id)
        .ok_or_else(|| OrmError::Database("empty identifier batch".into()))
}

fn id_query<M: Model>(action: QueryAction, id: &IdValue) -> OrmResult<Query> {
    let mut query = Query::new(M::table_name(), action);
    query.filter = Some(id.to_filter(M::id_columns())?);
    Ok(query)
}

struct NoopTerminal;

#[async_trait]
impl<M: Model> Terminal<M> for NoopTerminal {
    async fn write(&self, _model: &mut M) -> OrmResult<()> {
        Ok(())
    }
}

struct InsertTerminal {
    db: Database,
}

#[async_trait]
impl<M: Model> Terminal<M> for InsertTerminal {
    async fn write(&self, model: &mut M) -> OrmResult<()> {
        let record = insert_record(model)?;
        let acks = self
            .db
            .execute(Query::insert(M::table_name(), vec![record]))
            .await?;
        reconcile_id(model, acks.first())?;
        let snapshot = model.to_record()?;
        model.state_mut().mark_persisted(snapshot);
        Ok(())
    }
}

struct UpdateTerminal {
    db: Database,
    id: IdValue,
}

#[async_trait]
impl<M: Model> Terminal<M> for UpdateTerminal {
    async fn write(&self, model: &mut M) -> OrmResult<()> {
        // Recomputed here so middleware edits are part of the diff
        let dirty = dirty_diff(model)?;
        if dirty.is_empty() {
            return Ok(());
        }
        let mut query = id_query::<M>(QueryAction::Update, &self.id)?;
        query.input = vec![dirty];
        self.db.execute(query).await?;
        let snapshot = model.to_record()?;
        model.state_mut().mark_persisted(snapshot);
        Ok(())
    }
}

struct SoftDeleteTerminal {
    db: Database,
    id: IdValue,
    column: &'static str,
}

#[async_trait]
impl<M: Model> Terminal<M> for SoftDeleteTerminal {
    async fn write(&self, model: &mut M) -> OrmResult<()> {
        let now = Utc::now();
        let mut query = id_query::<M>(QueryAction::Update, &self.id)?;
        let mut sets = Record::new();
        sets.set(self.column, Value::DateTime(now));
        query.input = vec![sets];
        self.db.execute(query).await?;
        model.set_deleted_at(Some(now));
        // Still a stored row: soft-deleted models stay restorable
        let snapshot = model.to_record()?;
        model.state_mut().mark_persisted(snapshot);
        Ok(())
    }
}

struct HardDeleteTerminal {
    db: Database,
    id: IdValue,
}

#[async_trait]
impl<M: Model> Terminal<M> for HardDeleteTerminal {
    async fn write(&self, model: &mut M) -> OrmResult<()> {
        let query = id_query::<M>(QueryAction::Delete, &self.id)?;
        self.db.execute(query).await?;
        model.state_mut().mark_removed();
        Ok(())
    }
}

struct RestoreTerminal {
    db: Database,
    id: IdValue,
    column: &'static str,
}

#[async_trait]
impl<M: Model> Terminal<M> for RestoreTerminal {
    async fn write(&self, model: &mut M) -> OrmResult<()> {
        // Built directly so the soft-delete exclusion never hides the row
        let mut query = id_query::<M>(QueryAction::Update, &self.id)?;
        let mut sets = Record::new();
        sets.set(self.column, Value::Null);
        query.input = vec![sets];
        self.db.execute(query).await?;
        model.set_deleted_at(None);
        let snapshot = model.to_record()?;
        model.state_mut().mark_persisted(snapshot);
        Ok(())
    }
}
