//! Database handle
//!
//! Cheap-to-clone facade over a driver plus the middleware configuration.
//! Query builders, lifecycle operations, and the migrator all go through
//! this handle, so swapping the driver swaps the whole backend.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::driver::Driver;
use crate::error::{OrmError, OrmResult};
use crate::middleware::MiddlewareSet;
use crate::model::Model;
use crate::query::{Query, QueryBuilder};
use crate::schema::SchemaStatement;
use crate::value::Record;

/// Handle to a database: driver + middleware configuration
#[derive(Clone)]
pub struct Database {
    driver: Arc<dyn Driver>,
    middleware: Arc<MiddlewareSet>,
    in_transaction: bool,
}

impl Database {
    /// Wrap a driver with no middleware configured
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self::with_middleware(driver, MiddlewareSet::new())
    }

    /// Wrap a driver with a middleware configuration. The configuration is
    /// fixed for the lifetime of the handle and every clone of it.
    pub fn with_middleware(driver: Arc<dyn Driver>, middleware: MiddlewareSet) -> Self {
        Self {
            driver,
            middleware: Arc::new(middleware),
            in_transaction: false,
        }
    }

    /// Start a query builder for a model type
    pub fn query<M: Model>(&self) -> QueryBuilder<M> {
        QueryBuilder::new(self)
    }

    /// Hand a query to the driver
    pub async fn execute(&self, query: Query) -> OrmResult<Vec<Record>> {
        debug!(table = %query.table, action = ?query.action, "dispatching query");
        self.driver.execute(&query).await
    }

    /// Hand a schema statement to the driver
    pub async fn execute_schema(&self, statement: &SchemaStatement) -> OrmResult<()> {
        debug!(statement = ?statement, "dispatching schema statement");
        self.driver.execute_schema(statement).await
    }

    /// Run a closure inside a transaction. The closure receives a scoped
    /// handle; returning `Ok` commits, returning `Err` rolls back. Invoked
    /// on a handle already inside a transaction, the closure joins the open
    /// transaction instead of opening a second one.
    pub async fn transaction<F, Fut, T>(&self, f: F) -> OrmResult<T>
    where
        F: FnOnce(Database) -> Fut,
        Fut: Future<Output = OrmResult<T>>,
    {
        if self.in_transaction {
            debug!("joining open transaction");
            return f(self.clone()).await;
        }

        let tx = self
            .driver
            .begin()
            .await
            .map_err(|e| OrmError::Transaction(e.to_string()))?;
        let scoped = Database {
            driver: tx.driver(),
            middleware: Arc::clone(&self.middleware),
            in_transaction: true,
        };

        match f(scoped).await {
            Ok(value) => {
                tx.commit()
                    .await
                    .map_err(|e| OrmError::Transaction(e.to_string()))?;
                Ok(value)
            }
            Err(err) => {
                // Best effort; the original error wins
                let _ = tx.rollback().await;
                Err(err)
            }
        }
    }

    /// Whether this handle is scoped to an open transaction
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    pub(crate) fn middleware(&self) -> &MiddlewareSet {
        &self.middleware
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("in_transaction", &self.in_transaction)
            .field("middleware", &self.middleware)
            .finish()
    }
}
