//! Query Module - backend-neutral query representation and fluent builder

pub mod builder;
pub mod execution;
pub mod filter;
pub mod joins;
pub mod ordering;
pub mod pagination;
pub mod types;
pub mod with;

pub use builder::QueryBuilder;
pub use filter::FilterGroup;
pub use pagination::Page;
pub use types::{
    Aggregate, Comparator, FieldRef, Filter, FilterOp, JoinClause, JoinKind, OrderDirection,
    Query, QueryAction, QueryRange, SortKey,
};
