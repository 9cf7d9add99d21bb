//! Migration definitions and registry

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::database::Database;
use crate::error::OrmResult;

/// A reversible schema change
#[async_trait]
pub trait Migration: Send + Sync {
    /// Stable name recorded in the migration log
    fn name(&self) -> &str;

    /// Apply the change
    async fn prepare(&self, db: &Database) -> OrmResult<()>;

    /// Undo the change
    async fn revert(&self, db: &Database) -> OrmResult<()>;
}

/// Identifier of a logical database. Migrations registered without an
/// explicit identifier target the default database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DatabaseId(Option<String>);

impl DatabaseId {
    /// The unnamed default database
    pub fn default_database() -> Self {
        Self(None)
    }

    /// A named logical database
    pub fn named(name: impl Into<String>) -> Self {
        Self(Some(name.into()))
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "default"),
        }
    }
}

/// Registration-ordered migration registry. Each entry maps one migration
/// to one logical database; registering the same migration for several
/// databases means registering it once per database.
#[derive(Default)]
pub struct Migrations {
    entries: Vec<(Arc<dyn Migration>, DatabaseId)>,
}

impl Migrations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a migration against the default database
    pub fn add(&mut self, migration: impl Migration + 'static) -> &mut Self {
        self.add_to(migration, DatabaseId::default_database())
    }

    /// Register a migration against a named logical database
    pub fn add_to(
        &mut self,
        migration: impl Migration + 'static,
        database: DatabaseId,
    ) -> &mut Self {
        self.entries.push((Arc::new(migration), database));
        self
    }

    /// Migrations for one database, in registration order
    pub(crate) fn for_database(&self, database: &DatabaseId) -> Vec<Arc<dyn Migration>> {
        self.entries
            .iter()
            .filter(|(_, db)| db == database)
            .map(|(m, _)| Arc::clone(m))
            .collect()
    }

    /// Look up a registered migration by logged name
    pub(crate) fn by_name(
        &self,
        database: &DatabaseId,
        name: &str,
    ) -> Option<Arc<dyn Migration>> {
        self.entries
            .iter()
            .find(|(m, db)| db == database && m.name() == name)
            .map(|(m, _)| Arc::clone(m))
    }
}

impl fmt::Debug for Migrations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migrations")
            .field("registered", &self.entries.len())
            .finish()
    }
}
