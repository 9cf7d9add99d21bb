//! Query Builder - Core builder implementation
//!
//! Chainable, pure construction of a `Query`. Nothing touches the driver
//! until a terminal method in `execution` is invoked.

use std::sync::Arc;

use crate::database::Database;
use crate::error::OrmError;
use crate::model::Model;
use crate::query::types::*;
use crate::relationships::EagerLoad;
use crate::value::{Record, Value};

/// Fluent query builder for a model type
pub struct QueryBuilder<M: Model> {
    pub(crate) db: Database,
    pub(crate) filters: Vec<Filter>,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) sorts: Vec<SortKey>,
    pub(crate) fields: Vec<FieldRef>,
    pub(crate) groups: Vec<FieldRef>,
    pub(crate) range: Option<QueryRange>,
    pub(crate) sets: Record,
    pub(crate) eager: Vec<Arc<dyn EagerLoad<M>>>,
    pub(crate) include_deleted: bool,
    /// Misuse detected while chaining; surfaced at the terminal call so
    /// the fluent surface stays infallible
    pub(crate) error: Option<OrmError>,
}

impl<M: Model> Clone for QueryBuilder<M> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            filters: self.filters.clone(),
            joins: self.joins.clone(),
            sorts: self.sorts.clone(),
            fields: self.fields.clone(),
            groups: self.groups.clone(),
            range: self.range,
            sets: self.sets.clone(),
            eager: self.eager.clone(),
            include_deleted: self.include_deleted,
            error: self.error.clone(),
        }
    }
}

impl<M: Model> std::fmt::Debug for QueryBuilder<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("table", &M::table_name())
            .field("filters", &self.filters)
            .field("joins", &self.joins)
            .field("sorts", &self.sorts)
            .field("range", &self.range)
            .field("include_deleted", &self.include_deleted)
            .finish()
    }
}

impl<M: Model> QueryBuilder<M> {
    /// Create a builder bound to a database handle
    pub fn new(db: &Database) -> Self {
        Self {
            db: db.clone(),
            filters: Vec::new(),
            joins: Vec::new(),
            sorts: Vec::new(),
            fields: Vec::new(),
            groups: Vec::new(),
            range: None,
            sets: Record::new(),
            eager: Vec::new(),
            include_deleted: false,
            error: None,
        }
    }

    /// Project a single field
    pub fn field(mut self, column: &str) -> Self {
        self.fields.push(FieldRef::parse(column));
        self
    }

    /// Project a set of fields
    pub fn fields(mut self, columns: &[&str]) -> Self {
        for column in columns {
            self.fields.push(FieldRef::parse(column));
        }
        self
    }

    /// Add a GROUP BY key
    pub fn group_by(mut self, column: &str) -> Self {
        self.groups.push(FieldRef::parse(column));
        self
    }

    /// Queue a set-clause for a bulk update terminal
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.sets.set(column, value);
        self
    }

    /// Include soft-deleted rows in this query
    pub fn with_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    /// Build the backend-neutral query for the given action. Pure: no I/O.
    ///
    /// The soft-delete exclusion is ANDed as an outer wrapper around the
    /// user's filter tree so it can never be absorbed into an OR group.
    pub fn build(&self, action: QueryAction) -> Result<Query, OrmError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }

        let mut filter = Filter::group(FilterOp::And, self.filters.clone());
        if let Some(column) = M::soft_delete_column() {
            if !self.include_deleted {
                let alive = Filter::Value {
                    field: FieldRef::new(column),
                    comparator: Comparator::IsNull,
                    value: Value::Null,
                };
                filter = Some(match filter {
                    Some(user_tree) => Filter::Group {
                        op: FilterOp::And,
                        filters: vec![user_tree, alive],
                    },
                    None => alive,
                });
            }
        }

        let mut query = Query::new(M::table_name(), action.clone());
        query.fields = self.fields.clone();
        query.filter = filter;
        query.joins = self.joins.clone();
        query.sorts = self.sorts.clone();
        query.groups = self.groups.clone();
        query.range = self.range;
        if matches!(action, QueryAction::Update) {
            query.input = vec![self.sets.clone()];
        }
        Ok(query)
    }

    /// Record a deferred builder error, keeping the first one
    pub(crate) fn defer_error(&mut self, err: OrmError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Push a pre-built filter onto the top-level AND scope
    pub(crate) fn filter_raw(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }
}
