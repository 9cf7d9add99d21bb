//! Backend-neutral ORM: fluent query construction over an intermediate
//! query representation, model lifecycle with dirty tracking and soft
//! deletes, batched eager loading, lifecycle middleware, and a batch-based
//! migration engine.
//!
//! Queries never carry backend syntax: a builder produces a [`query::Query`]
//! value and a [`driver::Driver`] interprets it. The crate ships an
//! in-memory reference driver used by the test suite.

pub mod database;
pub mod driver;
pub mod error;
pub mod middleware;
pub mod migrations;
pub mod model;
pub mod query;
pub mod relationships;
pub mod schema;
pub mod value;

pub use database::Database;
pub use driver::{Driver, MemoryDriver, Transaction};
pub use error::{
    ConstraintError, FieldError, IdentifierError, MigrationError, OrmError, OrmResult,
    RelationError,
};
pub use middleware::{LifecycleEvent, Middleware, MiddlewareSet, Next};
pub use migrations::{DatabaseId, Migration, MigrationLog, Migrations, Migrator};
pub use model::{hydrate, FieldDef, FieldKind, IdGeneration, IdValue, Model, ModelCrud, ModelState};
pub use query::{
    Aggregate, Comparator, FieldRef, Filter, FilterOp, JoinClause, JoinKind, OrderDirection,
    Page, Query, QueryAction, QueryBuilder, QueryRange, SortKey,
};
pub use relationships::{
    AttachMethod, BelongsTo, BelongsToRelation, EagerLoad, HasMany, HasManyRelation, HasOne,
    HasOneRelation, IntoEagerLoad, ManyToMany, ManyToManyRelation, OptionalBelongsTo,
    OptionalBelongsToRelation,
};
pub use schema::{
    ColumnDefinition, ColumnType, ReferenceAction, Schema, SchemaStatement, TableConstraint,
    TableDefinition,
};
pub use value::{Record, Value};
