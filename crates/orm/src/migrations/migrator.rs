//! Migrator
//!
//! Runs registered migrations against one or more logical databases. Each
//! database keeps its own log table and batch counter; batches on one
//! database never influence another.
//!
//! A batch is not transactional: when a migration fails mid-batch, the
//! remainder of the batch is skipped, DDL already applied stays applied,
//! and the log rows written so far remain. A follow-up `prepare_batch`
//! picks up the pending migrations in a fresh batch.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::database::Database;
use crate::error::{MigrationError, OrmResult};
use crate::migrations::definitions::{DatabaseId, Migrations};
use crate::migrations::log::{log_table_schema, MigrationLog};
use crate::model::ModelCrud;
use crate::value::Value;

pub struct Migrator {
    databases: HashMap<DatabaseId, Database>,
    migrations: Migrations,
}

impl Migrator {
    /// A migrator over an explicit database map
    pub fn new(migrations: Migrations) -> Self {
        Self {
            databases: HashMap::new(),
            migrations,
        }
    }

    /// Shorthand for the common single-database setup
    pub fn single(db: Database, migrations: Migrations) -> Self {
        let mut migrator = Self::new(migrations);
        migrator.add_database(DatabaseId::default_database(), db);
        migrator
    }

    pub fn add_database(&mut self, id: DatabaseId, db: Database) -> &mut Self {
        self.databases.insert(id, db);
        self
    }

    /// Create the migration log table wherever it does not exist yet
    pub async fn setup_if_needed(&self) -> OrmResult<()> {
        for db in self.databases.values() {
            db.execute_schema(&log_table_schema()).await?;
        }
        Ok(())
    }

    /// Run every pending migration, one new batch per database that has
    /// pending work
    pub async fn prepare_batch(&self) -> OrmResult<()> {
        for (id, db) in &self.databases {
            self.prepare_database(id, db).await?;
        }
        Ok(())
    }

    /// Revert the most recent batch on every database
    pub async fn revert_last_batch(&self) -> OrmResult<()> {
        for (id, db) in &self.databases {
            self.revert_one_batch(id, db).await?;
        }
        Ok(())
    }

    /// Revert every applied batch on every database
    pub async fn revert_all_batches(&self) -> OrmResult<()> {
        for (id, db) in &self.databases {
            while self.revert_one_batch(id, db).await? {}
        }
        Ok(())
    }

    async fn prepare_database(&self, id: &DatabaseId, db: &Database) -> OrmResult<()> {
        let registered = self.migrations.for_database(id);
        if registered.is_empty() {
            return Ok(());
        }
        let applied: Vec<String> = MigrationLog::query(db)
            .all()
            .await?
            .into_iter()
            .map(|log| log.name)
            .collect();
        let pending: Vec<_> = registered
            .into_iter()
            .filter(|m| !applied.iter().any(|name| name == m.name()))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let batch = self.current_batch(db).await? + 1;
        info!(database = %id, batch, pending = pending.len(), "preparing migration batch");
        for (index, migration) in pending.iter().enumerate() {
            if let Err(err) = migration.prepare(db).await {
                if index > 0 {
                    warn!(
                        database = %id,
                        batch,
                        applied = index,
                        "batch aborted mid-run; applied migrations and their log rows remain"
                    );
                }
                return Err(MigrationError::Failed {
                    name: migration.name().to_string(),
                    phase: "prepare",
                    message: err.to_string(),
                }
                .into());
            }
            MigrationLog::create(db, MigrationLog::new(migration.name(), batch)).await?;
            info!(database = %id, batch, migration = migration.name(), "applied");
        }
        Ok(())
    }

    /// Revert the highest batch on one database. `Ok(false)` when nothing
    /// has been applied.
    async fn revert_one_batch(&self, id: &DatabaseId, db: &Database) -> OrmResult<bool> {
        let batch = self.current_batch(db).await?;
        if batch == 0 {
            return Ok(false);
        }
        // Strict reverse application order
        let logs = MigrationLog::query(db)
            .where_eq("batch", batch)
            .order_by_desc("id")
            .all()
            .await?;
        info!(database = %id, batch, count = logs.len(), "reverting migration batch");
        for mut log in logs {
            let migration = self.migrations.by_name(id, &log.name).ok_or_else(|| {
                MigrationError::NotRegistered {
                    name: log.name.clone(),
                }
            })?;
            migration.revert(db).await.map_err(|err| MigrationError::Failed {
                name: log.name.clone(),
                phase: "revert",
                message: err.to_string(),
            })?;
            let name = log.name.clone();
            log.force_delete(db).await?;
            info!(database = %id, batch, migration = %name, "reverted");
        }
        Ok(true)
    }

    /// Highest batch number in the log; 0 when the log is empty
    async fn current_batch(&self, db: &Database) -> OrmResult<i64> {
        match MigrationLog::query(db).max("batch").await? {
            Value::Int(n) => Ok(n),
            _ => Ok(0),
        }
    }
}
