//! Driver abstraction
//!
//! A driver interprets the backend-neutral query and schema representations.
//! Reads return rows; writes return an acknowledgement: updates and deletes
//! report the affected-row count in the first column of a single record,
//! inserts return one record per input row carrying any backend-generated
//! key columns (empty records when there is nothing to reconcile).

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::OrmResult;
use crate::query::Query;
use crate::schema::SchemaStatement;
use crate::value::Record;

pub use memory::MemoryDriver;

/// An interpreter for the query and schema representations
#[async_trait]
pub trait Driver: Send + Sync {
    /// Execute a query, returning rows or a write acknowledgement
    async fn execute(&self, query: &Query) -> OrmResult<Vec<Record>>;

    /// Execute a schema statement
    async fn execute_schema(&self, statement: &SchemaStatement) -> OrmResult<()>;

    /// Open a transaction
    async fn begin(&self) -> OrmResult<Box<dyn Transaction>>;
}

/// An open transaction. Statements issued through `driver()` are scoped to
/// the transaction; dropping without `commit` releases it.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Handle for issuing statements inside the transaction
    fn driver(&self) -> Arc<dyn Driver>;

    async fn commit(self: Box<Self>) -> OrmResult<()>;

    async fn rollback(self: Box<Self>) -> OrmResult<()>;
}
