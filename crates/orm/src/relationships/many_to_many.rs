//! Sibling relations through an explicit pivot model
//!
//! The pivot is a first-class model: it carries foreign-key columns for both
//! sides (matching each side's key columns in order) and may carry its own
//! payload columns. Loading walks pivot rows for the whole primary set in
//! one query, then fetches every referenced sibling in a second query and
//! partitions them back through the pivot pairs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::database::Database;
use crate::error::{IdentifierError, OrmError, OrmResult, RelationError};
use crate::model::{lifecycle, IdValue, Model};
use crate::query::{FieldRef, JoinClause, JoinKind, QueryBuilder};
use crate::relationships::eager_loading::{
    distinct_tuples, key_in_filter, key_tuple, EagerLoad, IntoEagerLoad,
};
use crate::relationships::has_many::owner_key_tuples;
use crate::value::Value;

/// Whether `attach` writes unconditionally or checks for an existing pivot
/// row first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachMethod {
    Always,
    IfNotExists,
}

/// Many-to-many relation descriptor
pub struct ManyToManyRelation<Owner: Model, Related: Model, Pivot: Model> {
    name: &'static str,
    /// Pivot columns referencing the owner's key, in key order
    pivot_owner_key: &'static [&'static str],
    /// Pivot columns referencing the related side's key, in key order
    pivot_related_key: &'static [&'static str],
    assign: fn(&mut Owner, Vec<Related>),
    make_pivot: fn(&Owner, &Related) -> Pivot,
    nested: Vec<Arc<dyn EagerLoad<Related>>>,
}

impl<Owner: Model, Related: Model, Pivot: Model> ManyToManyRelation<Owner, Related, Pivot> {
    pub fn new(
        name: &'static str,
        pivot_owner_key: &'static [&'static str],
        pivot_related_key: &'static [&'static str],
        assign: fn(&mut Owner, Vec<Related>),
        make_pivot: fn(&Owner, &Related) -> Pivot,
    ) -> Self {
        Self {
            name,
            pivot_owner_key,
            pivot_related_key,
            assign,
            make_pivot,
            nested: Vec::new(),
        }
    }

    /// Nest a further eager load on the loaded siblings
    pub fn with(mut self, nested: impl IntoEagerLoad<Related>) -> Self {
        self.nested.push(nested.into_eager());
        self
    }

    /// Connect `related` to `owner` with a fresh pivot row
    pub async fn attach(
        &self,
        db: &Database,
        owner: &Owner,
        related: &Related,
    ) -> OrmResult<()> {
        self.attach_via(db, owner, related, AttachMethod::Always, |_| {})
            .await
    }

    /// Connect with control over duplicate handling and a pivot edit hook
    /// applied before the row is persisted
    pub async fn attach_via<F>(
        &self,
        db: &Database,
        owner: &Owner,
        related: &Related,
        method: AttachMethod,
        edit: F,
    ) -> OrmResult<()>
    where
        F: FnOnce(&mut Pivot) + Send,
    {
        let (owner_id, related_id) = self.endpoint_ids(owner, related)?;
        if method == AttachMethod::IfNotExists {
            let existing = self
                .pivot_query(db, &owner_id, &related_id)?
                .count()
                .await?;
            if existing > 0 {
                return Ok(());
            }
        }
        let mut pivot = (self.make_pivot)(owner, related);
        edit(&mut pivot);
        lifecycle::persist_new(db, &mut pivot).await
    }

    /// Remove the pivot rows connecting `related` to `owner`, returning how
    /// many were removed
    pub async fn detach(
        &self,
        db: &Database,
        owner: &Owner,
        related: &Related,
    ) -> OrmResult<u64> {
        let (owner_id, related_id) = self.endpoint_ids(owner, related)?;
        self.pivot_query(db, &owner_id, &related_id)?
            .force_delete()
            .await
    }

    /// A builder over the related table scoped to one owner, routed through
    /// a join on the pivot
    pub fn query(&self, db: &Database, owner: &Owner) -> QueryBuilder<Related> {
        let on = Related::id_columns()
            .iter()
            .zip(self.pivot_related_key)
            .map(|(related_column, pivot_column)| {
                (
                    FieldRef::new(*related_column),
                    FieldRef::qualified(Pivot::table_name(), *pivot_column),
                )
            })
            .collect();
        let mut query = db.query::<Related>().join_on(JoinClause {
            kind: JoinKind::Inner,
            table: Pivot::table_name().to_string(),
            alias: None,
            on,
        });

        let parts = owner
            .id_value()
            .and_then(|id| id.ordered_values(Owner::id_columns()));
        match parts {
            Some(values) => {
                for (column, value) in self.pivot_owner_key.iter().zip(values) {
                    let path = format!("{}.{}", Pivot::table_name(), column);
                    query = query.where_eq(&path, value);
                }
            }
            None => query.defer_error(
                RelationError::OwnerIdRequired {
                    relation: self.name.to_string(),
                }
                .into(),
            ),
        }
        query
    }

    fn endpoint_ids(&self, owner: &Owner, related: &Related) -> OrmResult<(IdValue, IdValue)> {
        let owner_id = owner.id_value().ok_or_else(|| {
            OrmError::from(RelationError::OwnerIdRequired {
                relation: self.name.to_string(),
            })
        })?;
        let related_id = related
            .id_value()
            .ok_or(IdentifierError::IdRequired)?;
        Ok((owner_id, related_id))
    }

    /// Pivot rows matching one (owner, related) pair
    fn pivot_query(
        &self,
        db: &Database,
        owner_id: &IdValue,
        related_id: &IdValue,
    ) -> OrmResult<QueryBuilder<Pivot>> {
        let owner_values = owner_id
            .ordered_values(Owner::id_columns())
            .ok_or(IdentifierError::IdRequired)?;
        let related_values = related_id
            .ordered_values(Related::id_columns())
            .ok_or(IdentifierError::IdRequired)?;
        let mut query = db.query::<Pivot>();
        for (column, value) in self.pivot_owner_key.iter().zip(owner_values) {
            query = query.where_eq(column, value);
        }
        for (column, value) in self.pivot_related_key.iter().zip(related_values) {
            query = query.where_eq(column, value);
        }
        Ok(query)
    }
}

#[async_trait]
impl<Owner: Model, Related: Model, Pivot: Model> EagerLoad<Owner>
    for ManyToManyRelation<Owner, Related, Pivot>
{
    async fn load(&self, db: &Database, owners: &mut [Owner]) -> OrmResult<()> {
        if owners.is_empty() {
            return Ok(());
        }
        let owner_tuples = owner_key_tuples(owners)?;
        let distinct = distinct_tuples(owner_tuples.iter().flatten().cloned());

        // Walk the pivot for the whole primary set in one query
        let pivot_filter = match key_in_filter(self.pivot_owner_key, &distinct) {
            Some(filter) => filter,
            None => {
                for owner in owners.iter_mut() {
                    (self.assign)(owner, Vec::new());
                }
                return Ok(());
            }
        };
        let pivots = db.query::<Pivot>().filter_raw(pivot_filter).all().await?;

        let mut pairs: Vec<(Vec<Value>, Vec<Value>)> = Vec::with_capacity(pivots.len());
        for pivot in &pivots {
            let record = pivot.to_record()?;
            let owner_key = key_tuple(&record, self.pivot_owner_key);
            let related_key = key_tuple(&record, self.pivot_related_key);
            if let (Some(owner_key), Some(related_key)) = (owner_key, related_key) {
                pairs.push((owner_key, related_key));
            }
        }

        // Then every referenced sibling in a second query
        let related_tuples = distinct_tuples(pairs.iter().map(|(_, r)| r.clone()));
        let mut related_by_id: HashMap<Vec<Value>, Related> = HashMap::new();
        if let Some(filter) = key_in_filter(Related::id_columns(), &related_tuples) {
            let mut query = db.query::<Related>().filter_raw(filter);
            for loader in &self.nested {
                query = query.with(loader);
            }
            for related in query.all().await? {
                let record = related.to_record()?;
                if let Some(tuple) = key_tuple(&record, Related::id_columns()) {
                    related_by_id.insert(tuple, related);
                }
            }
        }

        let mut buckets: HashMap<Vec<Value>, Vec<Related>> = HashMap::new();
        for (owner_key, related_key) in pairs {
            if let Some(related) = related_by_id.get(&related_key) {
                buckets.entry(owner_key).or_default().push(related.clone());
            }
        }
        for (owner, tuple) in owners.iter_mut().zip(&owner_tuples) {
            let siblings = tuple
                .as_ref()
                .and_then(|t| buckets.remove(t))
                .unwrap_or_default();
            (self.assign)(owner, siblings);
        }
        Ok(())
    }
}

impl<Owner: Model, Related: Model, Pivot: Model> IntoEagerLoad<Owner>
    for ManyToManyRelation<Owner, Related, Pivot>
{
    fn into_eager(self) -> Arc<dyn EagerLoad<Owner>> {
        Arc::new(self)
    }
}
