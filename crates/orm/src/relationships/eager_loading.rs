//! Eager loading machinery
//!
//! A loaded query carries a tree of eager-load directives; after the primary
//! fetch, each directive issues exactly one batched follow-up query per
//! nesting level: distinct key tuples across the whole primary set go into a
//! single IN filter (an OR of AND groups for composite keys), and the rows
//! that come back are partitioned to their owners. Nested directives run on
//! the follow-up rows before partitioning, so shared parents carry their own
//! loaded graph.

use std::sync::Arc;

use async_trait::async_trait;

use crate::database::Database;
use crate::error::OrmResult;
use crate::model::Model;
use crate::query::{Comparator, FieldRef, Filter, FilterOp};
use crate::value::{Record, Value};

/// One eager-load directive over a primary set of `M`
#[async_trait]
pub trait EagerLoad<M: Model>: Send + Sync {
    async fn load(&self, db: &Database, models: &mut [M]) -> OrmResult<()>;
}

/// Anything a builder's `with(...)` accepts
pub trait IntoEagerLoad<M: Model> {
    fn into_eager(self) -> Arc<dyn EagerLoad<M>>;
}

impl<M: Model> IntoEagerLoad<M> for Arc<dyn EagerLoad<M>> {
    fn into_eager(self) -> Arc<dyn EagerLoad<M>> {
        self
    }
}

impl<M: Model> IntoEagerLoad<M> for &Arc<dyn EagerLoad<M>> {
    fn into_eager(self) -> Arc<dyn EagerLoad<M>> {
        Arc::clone(self)
    }
}

/// Read a key tuple out of a record. `None` when any component is absent
/// or null.
pub(crate) fn key_tuple(record: &Record, columns: &[&str]) -> Option<Vec<Value>> {
    let mut tuple = Vec::with_capacity(columns.len());
    for column in columns {
        let value = record.get(column)?;
        if value.is_null() {
            return None;
        }
        tuple.push(value.clone());
    }
    Some(tuple)
}

/// Deduplicate key tuples, preserving first-seen order
pub(crate) fn distinct_tuples(tuples: impl IntoIterator<Item = Vec<Value>>) -> Vec<Vec<Value>> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for tuple in tuples {
        if seen.insert(tuple.clone()) {
            out.push(tuple);
        }
    }
    out
}

/// The batched membership filter: a plain IN for simple keys, an OR of
/// per-tuple AND groups for composite keys. `None` when there are no
/// tuples to match.
pub(crate) fn key_in_filter(columns: &[&str], tuples: &[Vec<Value>]) -> Option<Filter> {
    if tuples.is_empty() {
        return None;
    }
    if columns.len() == 1 {
        let values: Vec<Value> = tuples.iter().map(|t| t[0].clone()).collect();
        return Some(Filter::Value {
            field: FieldRef::new(columns[0]),
            comparator: Comparator::In,
            value: Value::Array(values),
        });
    }
    let groups: Vec<Filter> = tuples
        .iter()
        .map(|tuple| {
            let eqs: Vec<Filter> = columns
                .iter()
                .zip(tuple)
                .map(|(column, value)| Filter::eq(FieldRef::new(*column), value.clone()))
                .collect();
            Filter::group(FilterOp::And, eqs)
        })
        .collect::<Option<Vec<_>>>()?;
    Filter::group(FilterOp::Or, groups)
}

/// Format a key tuple for error payloads
pub(crate) fn tuple_display(tuple: &[Value]) -> String {
    if tuple.len() == 1 {
        return tuple[0].to_string();
    }
    let parts: Vec<String> = tuple.iter().map(|v| v.to_string()).collect();
    format!("({})", parts.join(", "))
}
