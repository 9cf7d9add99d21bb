//! Migration engine: definitions, log, and batch runner

pub mod definitions;
pub mod log;
pub mod migrator;

pub use definitions::{DatabaseId, Migration, Migrations};
pub use log::{MigrationLog, MIGRATION_LOG_TABLE};
pub use migrator::Migrator;
