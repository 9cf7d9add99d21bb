//! Child collection relations
//!
//! Children reference their owner through foreign-key columns on the child
//! table, matching the owner's key columns in order. Loading fetches every
//! child of the primary set in one query and partitions them by foreign-key
//! tuple.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::database::Database;
use crate::error::{OrmResult, RelationError};
use crate::model::Model;
use crate::query::QueryBuilder;
use crate::relationships::eager_loading::{
    distinct_tuples, key_in_filter, key_tuple, EagerLoad, IntoEagerLoad,
};
use crate::value::Value;

/// One-to-many relation descriptor
pub struct HasManyRelation<Owner: Model, Child: Model> {
    name: &'static str,
    foreign_key: &'static [&'static str],
    assign: fn(&mut Owner, Vec<Child>),
    nested: Vec<Arc<dyn EagerLoad<Child>>>,
}

impl<Owner: Model, Child: Model> HasManyRelation<Owner, Child> {
    pub fn new(
        name: &'static str,
        foreign_key: &'static [&'static str],
        assign: fn(&mut Owner, Vec<Child>),
    ) -> Self {
        Self {
            name,
            foreign_key,
            assign,
            nested: Vec::new(),
        }
    }

    /// Nest a further eager load on the loaded children
    pub fn with(mut self, nested: impl IntoEagerLoad<Child>) -> Self {
        self.nested.push(nested.into_eager());
        self
    }

    /// A builder scoped to one owner's children, for filtered or sorted
    /// traversal without loading the whole collection
    pub fn query(&self, db: &Database, owner: &Owner) -> QueryBuilder<Child> {
        scoped_query(db, owner, self.name, self.foreign_key)
    }
}

#[async_trait]
impl<Owner: Model, Child: Model> EagerLoad<Owner> for HasManyRelation<Owner, Child> {
    async fn load(&self, db: &Database, owners: &mut [Owner]) -> OrmResult<()> {
        if owners.is_empty() {
            return Ok(());
        }
        let tuples = owner_key_tuples(owners)?;
        let mut buckets =
            fetch_children::<Child>(db, self.foreign_key, &tuples, &self.nested).await?;
        for (owner, tuple) in owners.iter_mut().zip(&tuples) {
            let children = tuple
                .as_ref()
                .and_then(|t| buckets.remove(t))
                .unwrap_or_default();
            (self.assign)(owner, children);
        }
        Ok(())
    }
}

impl<Owner: Model, Child: Model> IntoEagerLoad<Owner> for HasManyRelation<Owner, Child> {
    fn into_eager(self) -> Arc<dyn EagerLoad<Owner>> {
        Arc::new(self)
    }
}

pub(crate) fn owner_key_tuples<Owner: Model>(
    owners: &[Owner],
) -> OrmResult<Vec<Option<Vec<Value>>>> {
    owners
        .iter()
        .map(|owner| {
            let record = owner.to_record()?;
            Ok(key_tuple(&record, Owner::id_columns()))
        })
        .collect()
}

/// One query for every child of the primary set, bucketed by foreign-key
/// tuple. Nested directives run on the children before partitioning.
pub(crate) async fn fetch_children<Child: Model>(
    db: &Database,
    foreign_key: &[&str],
    owner_tuples: &[Option<Vec<Value>>],
    nested: &[Arc<dyn EagerLoad<Child>>],
) -> OrmResult<HashMap<Vec<Value>, Vec<Child>>> {
    let distinct = distinct_tuples(owner_tuples.iter().flatten().cloned());
    let filter = match key_in_filter(foreign_key, &distinct) {
        Some(filter) => filter,
        None => return Ok(HashMap::new()),
    };
    let mut query = db.query::<Child>().filter_raw(filter);
    for loader in nested {
        query = query.with(loader);
    }
    let children = query.all().await?;

    let mut buckets: HashMap<Vec<Value>, Vec<Child>> = HashMap::new();
    for child in children {
        let record = child.to_record()?;
        if let Some(tuple) = key_tuple(&record, foreign_key) {
            buckets.entry(tuple).or_default().push(child);
        }
    }
    Ok(buckets)
}

/// A builder over the related table filtered to one owner's key
pub(crate) fn scoped_query<Owner: Model, Related: Model>(
    db: &Database,
    owner: &Owner,
    relation: &'static str,
    foreign_key: &[&str],
) -> QueryBuilder<Related> {
    let mut query = db.query::<Related>();
    let parts = owner
        .id_value()
        .and_then(|id| id.ordered_values(Owner::id_columns()));
    match parts {
        Some(values) => {
            for (column, value) in foreign_key.iter().zip(values) {
                query = query.where_eq(column, value);
            }
        }
        None => {
            query.defer_error(
                RelationError::OwnerIdRequired {
                    relation: relation.to_string(),
                }
                .into(),
            );
        }
    }
    query
}
