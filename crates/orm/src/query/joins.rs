//! Query Builder JOIN operations

use crate::model::Model;
use crate::query::builder::QueryBuilder;
use crate::query::types::*;

impl<M: Model> QueryBuilder<M> {
    /// Inner join on a column equality pair. Paths use `"table.column"`
    /// notation; a bare column resolves against the base table.
    pub fn join(mut self, table: &str, left: &str, right: &str) -> Self {
        self.joins.push(JoinClause {
            kind: JoinKind::Inner,
            table: table.to_string(),
            alias: None,
            on: vec![(FieldRef::parse(left), FieldRef::parse(right))],
        });
        self
    }

    /// Left join on a column equality pair
    pub fn left_join(mut self, table: &str, left: &str, right: &str) -> Self {
        self.joins.push(JoinClause {
            kind: JoinKind::Left,
            table: table.to_string(),
            alias: None,
            on: vec![(FieldRef::parse(left), FieldRef::parse(right))],
        });
        self
    }

    /// Join with an explicit clause, for multi-column ON conditions
    pub fn join_on(mut self, clause: JoinClause) -> Self {
        self.joins.push(clause);
        self
    }
}
