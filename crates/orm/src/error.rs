//! Error types for the ORM system
//!
//! Every failure the engine can produce is typed so callers can branch on
//! kind without parsing driver strings.

use thiserror::Error;

/// Result type alias for ORM operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Top-level error type for ORM operations
#[derive(Debug, Clone, Error)]
pub enum OrmError {
    /// Malformed property access or filter shape
    #[error(transparent)]
    Field(#[from] FieldError),
    /// Relationship loading or mutation failed
    #[error(transparent)]
    Relation(#[from] RelationError),
    /// Backend-reported constraint violation
    #[error(transparent)]
    Constraint(#[from] ConstraintError),
    /// Migration prepare/revert failure
    #[error(transparent)]
    Migration(#[from] MigrationError),
    /// Lifecycle operation invoked without a persisted identifier
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
    /// Driver-level failure outside the constraint taxonomy
    #[error("database error: {0}")]
    Database(String),
    /// Record/model conversion failure
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Transaction begin/commit/rollback failure
    #[error("transaction error: {0}")]
    Transaction(String),
    /// Query construction misuse detected at a terminal call
    #[error("query error: {0}")]
    Query(String),
    /// Lookup that was required to match found nothing
    #[error("record not found in `{0}`")]
    NotFound(String),
}

/// Errors raised by property access and filter construction
#[derive(Debug, Clone, Error)]
pub enum FieldError {
    /// A driver column could not be decoded into the model's field type
    #[error("failed to decode column `{column}`: {message}")]
    Decode { column: String, message: String },
    /// A required column was absent from driver output
    #[error("missing required column `{column}` in driver output")]
    Missing { column: String },
    /// A filter shape the target key cannot support, e.g. a single field
    /// supplied where the full composite identifier is required
    #[error("unsupported filter shape: {message}")]
    UnsupportedFilter { message: String },
}

/// Errors raised by the relationship resolver
#[derive(Debug, Clone, Error)]
pub enum RelationError {
    /// A required parent row is absent (hard-deleted, or soft-deleted and
    /// not included via `with_deleted`)
    #[error("missing required parent: from `{from}` to `{to}` via `{key}` = {id}")]
    MissingParent {
        from: String,
        to: String,
        key: String,
        id: String,
    },
    /// Attach/detach was called before the owning side had a persisted id
    #[error("relation `{relation}` requires the owning model to have a persisted identifier")]
    OwnerIdRequired { relation: String },
    /// A relation property was read before being loaded
    #[error("relation `{relation}` has not been loaded")]
    NotLoaded { relation: String },
}

/// Constraint violations, classified so callers can branch without
/// backend-specific error codes
#[derive(Debug, Clone, Error)]
pub enum ConstraintError {
    #[error("unique constraint violated on `{table}` ({columns})")]
    Unique { table: String, columns: String },
    #[error("foreign key constraint violated on `{table}` ({columns})")]
    ForeignKey { table: String, columns: String },
    #[error("check constraint violated on `{table}`: {message}")]
    Check { table: String, message: String },
}

/// Errors raised by the migration engine
#[derive(Debug, Clone, Error)]
pub enum MigrationError {
    /// A migration's prepare or revert hook failed; the current batch stops
    /// here and already-applied work in the batch is not rolled back
    #[error("migration `{name}` failed to {phase}: {message}")]
    Failed {
        name: String,
        phase: &'static str,
        message: String,
    },
    /// A logged migration has no registered counterpart to revert
    #[error("migration `{name}` is recorded in the log but not registered")]
    NotRegistered { name: String },
}

/// Identifier lifecycle errors
#[derive(Debug, Clone, Error)]
pub enum IdentifierError {
    #[error("operation requires a persisted identifier")]
    IdRequired,
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        OrmError::Serialization(err.to_string())
    }
}
