//! Zero-or-one child relations
//!
//! Same key plumbing as the child collection relation, keeping only the
//! first child per owner.

use std::sync::Arc;

use async_trait::async_trait;

use crate::database::Database;
use crate::error::OrmResult;
use crate::model::Model;
use crate::query::QueryBuilder;
use crate::relationships::eager_loading::{EagerLoad, IntoEagerLoad};
use crate::relationships::has_many::{fetch_children, owner_key_tuples, scoped_query};

/// One-to-zero-or-one relation descriptor
pub struct HasOneRelation<Owner: Model, Child: Model> {
    name: &'static str,
    foreign_key: &'static [&'static str],
    assign: fn(&mut Owner, Option<Child>),
    nested: Vec<Arc<dyn EagerLoad<Child>>>,
}

impl<Owner: Model, Child: Model> HasOneRelation<Owner, Child> {
    pub fn new(
        name: &'static str,
        foreign_key: &'static [&'static str],
        assign: fn(&mut Owner, Option<Child>),
    ) -> Self {
        Self {
            name,
            foreign_key,
            assign,
            nested: Vec::new(),
        }
    }

    pub fn with(mut self, nested: impl IntoEagerLoad<Child>) -> Self {
        self.nested.push(nested.into_eager());
        self
    }

    /// A builder scoped to one owner's child row
    pub fn query(&self, db: &Database, owner: &Owner) -> QueryBuilder<Child> {
        scoped_query(db, owner, self.name, self.foreign_key)
    }
}

#[async_trait]
impl<Owner: Model, Child: Model> EagerLoad<Owner> for HasOneRelation<Owner, Child> {
    async fn load(&self, db: &Database, owners: &mut [Owner]) -> OrmResult<()> {
        if owners.is_empty() {
            return Ok(());
        }
        let tuples = owner_key_tuples(owners)?;
        let mut buckets =
            fetch_children::<Child>(db, self.foreign_key, &tuples, &self.nested).await?;
        for (owner, tuple) in owners.iter_mut().zip(&tuples) {
            let child = tuple
                .as_ref()
                .and_then(|t| buckets.remove(t))
                .and_then(|mut children| {
                    if children.is_empty() {
                        None
                    } else {
                        Some(children.remove(0))
                    }
                });
            (self.assign)(owner, child);
        }
        Ok(())
    }
}

impl<Owner: Model, Child: Model> IntoEagerLoad<Owner> for HasOneRelation<Owner, Child> {
    fn into_eager(self) -> Arc<dyn EagerLoad<Owner>> {
        Arc::new(self)
    }
}
