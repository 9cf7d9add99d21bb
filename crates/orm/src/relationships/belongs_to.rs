//! Parent relations
//!
//! A child row references its parent through foreign-key columns matching
//! the parent's key columns in order. Loading collects the distinct
//! foreign-key tuples across the primary set, fetches every referenced
//! parent in one query, and partitions them back.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::database::Database;
use crate::error::{OrmResult, RelationError};
use crate::model::Model;
use crate::relationships::eager_loading::{
    distinct_tuples, key_in_filter, key_tuple, tuple_display, EagerLoad, IntoEagerLoad,
};
use crate::value::Value;

/// Required-parent relation descriptor. A referenced parent that cannot be
/// fetched (hard-deleted, or soft-deleted and excluded) fails the load with
/// a structured missing-parent error rather than silently dropping the row;
/// `with_deleted` widens the parent fetch to soft-deleted rows.
pub struct BelongsToRelation<Owner: Model, Parent: Model> {
    foreign_key: &'static [&'static str],
    assign: fn(&mut Owner, Parent),
    nested: Vec<Arc<dyn EagerLoad<Parent>>>,
    include_deleted: bool,
}

impl<Owner: Model, Parent: Model> BelongsToRelation<Owner, Parent> {
    pub fn new(foreign_key: &'static [&'static str], assign: fn(&mut Owner, Parent)) -> Self {
        Self {
            foreign_key,
            assign,
            nested: Vec::new(),
            include_deleted: false,
        }
    }

    /// Nest a further eager load on the loaded parents
    pub fn with(mut self, nested: impl IntoEagerLoad<Parent>) -> Self {
        self.nested.push(nested.into_eager());
        self
    }

    /// Include soft-deleted parents in the follow-up query
    pub fn with_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }
}

#[async_trait]
impl<Owner: Model, Parent: Model> EagerLoad<Owner> for BelongsToRelation<Owner, Parent> {
    async fn load(&self, db: &Database, owners: &mut [Owner]) -> OrmResult<()> {
        if owners.is_empty() {
            return Ok(());
        }
        let tuples = foreign_key_tuples(owners, self.foreign_key)?;
        let distinct = distinct_tuples(tuples.iter().flatten().cloned());
        let parents =
            fetch_parents::<Parent>(db, &distinct, &self.nested, self.include_deleted).await?;

        for (owner, tuple) in owners.iter_mut().zip(&tuples) {
            let tuple = tuple.as_ref().ok_or_else(|| RelationError::MissingParent {
                from: Owner::table_name().to_string(),
                to: Parent::table_name().to_string(),
                key: self.foreign_key.join(", "),
                id: "null".to_string(),
            })?;
            let parent =
                parents
                    .get(tuple)
                    .cloned()
                    .ok_or_else(|| RelationError::MissingParent {
                        from: Owner::table_name().to_string(),
                        to: Parent::table_name().to_string(),
                        key: self.foreign_key.join(", "),
                        id: tuple_display(tuple),
                    })?;
            (self.assign)(owner, parent);
        }
        Ok(())
    }
}

impl<Owner: Model, Parent: Model> IntoEagerLoad<Owner> for BelongsToRelation<Owner, Parent> {
    fn into_eager(self) -> Arc<dyn EagerLoad<Owner>> {
        Arc::new(self)
    }
}

/// Optional-parent relation descriptor. Nil foreign keys and dangling
/// references both load as "no parent"; a primary set whose keys are all
/// nil short-circuits without a query.
pub struct OptionalBelongsToRelation<Owner: Model, Parent: Model> {
    foreign_key: &'static [&'static str],
    assign: fn(&mut Owner, Option<Parent>),
    nested: Vec<Arc<dyn EagerLoad<Parent>>>,
    include_deleted: bool,
}

impl<Owner: Model, Parent: Model> OptionalBelongsToRelation<Owner, Parent> {
    pub fn new(
        foreign_key: &'static [&'static str],
        assign: fn(&mut Owner, Option<Parent>),
    ) -> Self {
        Self {
            foreign_key,
            assign,
            nested: Vec::new(),
            include_deleted: false,
        }
    }

    pub fn with(mut self, nested: impl IntoEagerLoad<Parent>) -> Self {
        self.nested.push(nested.into_eager());
        self
    }

    /// Include soft-deleted parents in the follow-up query
    pub fn with_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }
}

#[async_trait]
impl<Owner: Model, Parent: Model> EagerLoad<Owner> for OptionalBelongsToRelation<Owner, Parent> {
    async fn load(&self, db: &Database, owners: &mut [Owner]) -> OrmResult<()> {
        if owners.is_empty() {
            return Ok(());
        }
        let tuples = foreign_key_tuples(owners, self.foreign_key)?;
        let distinct = distinct_tuples(tuples.iter().flatten().cloned());
        if distinct.is_empty() {
            // Every key is nil; nothing to fetch
            for owner in owners.iter_mut() {
                (self.assign)(owner, None);
            }
            return Ok(());
        }
        let parents =
            fetch_parents::<Parent>(db, &distinct, &self.nested, self.include_deleted).await?;
        for (owner, tuple) in owners.iter_mut().zip(&tuples) {
            let parent = tuple.as_ref().and_then(|t| parents.get(t).cloned());
            (self.assign)(owner, parent);
        }
        Ok(())
    }
}

impl<Owner: Model, Parent: Model> IntoEagerLoad<Owner>
    for OptionalBelongsToRelation<Owner, Parent>
{
    fn into_eager(self) -> Arc<dyn EagerLoad<Owner>> {
        Arc::new(self)
    }
}

fn foreign_key_tuples<Owner: Model>(
    owners: &[Owner],
    foreign_key: &[&str],
) -> OrmResult<Vec<Option<Vec<Value>>>> {
    owners
        .iter()
        .map(|owner| {
            let record = owner.to_record()?;
            Ok(key_tuple(&record, foreign_key))
        })
        .collect()
}

/// One query for every referenced parent, keyed by identifier tuple.
/// Nested directives run here, before partitioning.
async fn fetch_parents<Parent: Model>(
    db: &Database,
    tuples: &[Vec<Value>],
    nested: &[Arc<dyn EagerLoad<Parent>>],
    include_deleted: bool,
) -> OrmResult<HashMap<Vec<Value>, Parent>> {
    let filter = match key_in_filter(Parent::id_columns(), tuples) {
        Some(filter) => filter,
        None => return Ok(HashMap::new()),
    };
    let mut query = db.query::<Parent>().filter_raw(filter);
    if include_deleted {
        query = query.with_deleted();
    }
    for loader in nested {
        query = query.with(loader);
    }
    let parents = query.all().await?;

    let mut by_id = HashMap::with_capacity(parents.len());
    for parent in parents {
        let record = parent.to_record()?;
        if let Some(tuple) = key_tuple(&record, Parent::id_columns()) {
            by_id.insert(tuple, parent);
        }
    }
    Ok(by_id)
}
