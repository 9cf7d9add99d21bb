//! Query Builder eager-load directives
//!
//! `with` attaches a directive node to the builder; directives form a tree
//! (a relation descriptor's own `with` nests children) that the resolver
//! walks after the primary fetch. Aggregate terminals never consult them.

use crate::model::Model;
use crate::query::builder::QueryBuilder;
use crate::relationships::IntoEagerLoad;

impl<M: Model> QueryBuilder<M> {
    /// Eagerly load a relation (or a pre-built nested directive tree)
    /// alongside the primary result set
    pub fn with(mut self, relation: impl IntoEagerLoad<M>) -> Self {
        self.eager.push(relation.into_eager());
        self
    }

    /// Conditionally attach an eager-load directive
    pub fn with_when(self, condition: bool, relation: impl IntoEagerLoad<M>) -> Self {
        if condition {
            self.with(relation)
        } else {
            self
        }
    }
}
