//! Query Representation - backend-neutral description of a database operation
//!
//! The `Query` value object is what the fluent builder produces and what a
//! `Driver` consumes. It carries no backend syntax: drivers translate it to
//! their own wire or storage format.

use std::fmt;

use crate::value::{Record, Value};

/// The operation a query performs
#[derive(Debug, Clone, PartialEq)]
pub enum QueryAction {
    Select,
    Insert,
    Update,
    Delete,
    Aggregate(Aggregate),
}

/// Aggregate computations
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregate {
    Count,
    Sum(String),
    Min(String),
    Max(String),
    Average(String),
}

/// Comparison operators usable in filter predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparator::Equal => write!(f, "="),
            Comparator::NotEqual => write!(f, "!="),
            Comparator::LessThan => write!(f, "<"),
            Comparator::LessThanOrEqual => write!(f, "<="),
            Comparator::GreaterThan => write!(f, ">"),
            Comparator::GreaterThanOrEqual => write!(f, ">="),
            Comparator::Like => write!(f, "LIKE"),
            Comparator::NotLike => write!(f, "NOT LIKE"),
            Comparator::In => write!(f, "IN"),
            Comparator::NotIn => write!(f, "NOT IN"),
            Comparator::IsNull => write!(f, "IS NULL"),
            Comparator::IsNotNull => write!(f, "IS NOT NULL"),
        }
    }
}

/// How filters in a group combine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    And,
    Or,
}

/// A reference to a field, optionally qualified by table or join alias
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub table: Option<String>,
    pub column: String,
}

impl FieldRef {
    /// Unqualified reference, resolved against the query's base table
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            table: None,
            column: column.into(),
        }
    }

    /// Reference qualified by a table name or join alias
    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            column: column.into(),
        }
    }

    /// Parse `"table.column"` or `"column"` notation
    pub fn parse(path: &str) -> Self {
        match path.split_once('.') {
            Some((table, column)) => Self::qualified(table, column),
            None => Self::new(path),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table, self.column),
            None => write!(f, "{}", self.column),
        }
    }
}

/// Filter predicate tree
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field compared against a bound value
    Value {
        field: FieldRef,
        comparator: Comparator,
        value: Value,
    },
    /// Field compared against another field
    Field {
        left: FieldRef,
        comparator: Comparator,
        right: FieldRef,
    },
    /// AND/OR group of nested filters
    Group { op: FilterOp, filters: Vec<Filter> },
}

impl Filter {
    /// Equality filter; a null value compiles to IS NULL, not an
    /// equality bind
    pub fn eq(field: FieldRef, value: impl Into<Value>) -> Self {
        Self::comparison(field, Comparator::Equal, value)
    }

    /// Build a field/value comparison, normalizing null handling
    pub fn comparison(field: FieldRef, comparator: Comparator, value: impl Into<Value>) -> Self {
        let value = value.into();
        let comparator = match (comparator, value.is_null()) {
            (Comparator::Equal, true) => Comparator::IsNull,
            (Comparator::NotEqual, true) => Comparator::IsNotNull,
            (c, _) => c,
        };
        Filter::Value {
            field,
            comparator,
            value,
        }
    }

    /// Combine filters under one operator; a single filter collapses to
    /// itself
    pub fn group(op: FilterOp, mut filters: Vec<Filter>) -> Option<Self> {
        match filters.len() {
            0 => None,
            1 => Some(filters.remove(0)),
            _ => Some(Filter::Group { op, filters }),
        }
    }
}

/// Join kinds supported by the representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinKind::Inner => write!(f, "INNER JOIN"),
            JoinKind::Left => write!(f, "LEFT JOIN"),
        }
    }
}

/// A join against another table
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub kind: JoinKind,
    pub table: String,
    pub alias: Option<String>,
    /// Column equality pairs: (field on the current row set, field on the
    /// joined table)
    pub on: Vec<(FieldRef, FieldRef)>,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// A sort key
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: FieldRef,
    pub direction: OrderDirection,
}

/// Offset/limit window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryRange {
    pub offset: u64,
    pub limit: Option<u64>,
}

/// A complete, backend-neutral query
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub action: QueryAction,
    /// Projected fields; empty means all fields of the base table
    pub fields: Vec<FieldRef>,
    pub filter: Option<Filter>,
    pub joins: Vec<JoinClause>,
    pub sorts: Vec<SortKey>,
    pub groups: Vec<FieldRef>,
    pub range: Option<QueryRange>,
    /// Rows to insert, or a single set-clause record for updates
    pub input: Vec<Record>,
}

impl Query {
    /// Create a query with the given table and action
    pub fn new(table: impl Into<String>, action: QueryAction) -> Self {
        Self {
            table: table.into(),
            action,
            fields: Vec::new(),
            filter: None,
            joins: Vec::new(),
            sorts: Vec::new(),
            groups: Vec::new(),
            range: None,
            input: Vec::new(),
        }
    }

    /// Shorthand for an insert carrying the given rows
    pub fn insert(table: impl Into<String>, rows: Vec<Record>) -> Self {
        let mut query = Query::new(table, QueryAction::Insert);
        query.input = rows;
        query
    }
}
