//! Query Builder WHERE operations
//!
//! The filter family pushes predicates onto the builder's top-level AND
//! scope; `group` opens a nested AND/OR scope.

use crate::error::{FieldError, OrmError};
use crate::model::{IdValue, Model};
use crate::query::builder::QueryBuilder;
use crate::query::types::*;
use crate::value::Value;

impl<M: Model> QueryBuilder<M> {
    /// Add a filter with an explicit comparator
    pub fn filter(mut self, column: &str, comparator: Comparator, value: impl Into<Value>) -> Self {
        self.filters
            .push(Filter::comparison(FieldRef::parse(column), comparator, value));
        self
    }

    /// Equality filter; null values compile to IS NULL
    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, Comparator::Equal, value)
    }

    /// Inequality filter; null values compile to IS NOT NULL
    pub fn where_ne(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, Comparator::NotEqual, value)
    }

    pub fn where_gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, Comparator::GreaterThan, value)
    }

    pub fn where_gte(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, Comparator::GreaterThanOrEqual, value)
    }

    pub fn where_lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, Comparator::LessThan, value)
    }

    pub fn where_lte(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, Comparator::LessThanOrEqual, value)
    }

    pub fn where_like(self, column: &str, pattern: &str) -> Self {
        self.filter(column, Comparator::Like, pattern)
    }

    /// Membership filter over a value set
    pub fn where_in(mut self, column: &str, values: Vec<Value>) -> Self {
        self.filters.push(Filter::Value {
            field: FieldRef::parse(column),
            comparator: Comparator::In,
            value: Value::Array(values),
        });
        self
    }

    pub fn where_not_in(mut self, column: &str, values: Vec<Value>) -> Self {
        self.filters.push(Filter::Value {
            field: FieldRef::parse(column),
            comparator: Comparator::NotIn,
            value: Value::Array(values),
        });
        self
    }

    pub fn where_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::Value {
            field: FieldRef::parse(column),
            comparator: Comparator::IsNull,
            value: Value::Null,
        });
        self
    }

    pub fn where_not_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::Value {
            field: FieldRef::parse(column),
            comparator: Comparator::IsNotNull,
            value: Value::Null,
        });
        self
    }

    /// Field-to-field comparison
    pub fn where_field(mut self, left: &str, comparator: Comparator, right: &str) -> Self {
        self.filters.push(Filter::Field {
            left: FieldRef::parse(left),
            comparator,
            right: FieldRef::parse(right),
        });
        self
    }

    /// Filter by the model's identifier. The shape of the id must match the
    /// model's key: a simple id against a simple key, a composite id whose
    /// named parts cover every key column. A partial composite is a
    /// `FieldError` surfaced at the terminal call.
    pub fn filter_id(mut self, id: &IdValue) -> Self {
        match id.to_filter(M::id_columns()) {
            Ok(filter) => self.filters.push(filter),
            Err(err) => self.defer_error(err),
        }
        self
    }

    /// Open a nested filter scope combined under `op`. Filters added inside
    /// the closure combine with each other using `op`; the group as a whole
    /// joins the parent scope under the parent's operator.
    pub fn group<F>(mut self, op: FilterOp, f: F) -> Self
    where
        F: FnOnce(FilterGroup) -> FilterGroup,
    {
        let built = f(FilterGroup::new(op));
        if let Some(err) = built.error {
            self.defer_error(err);
        } else if let Some(filter) = Filter::group(built.op, built.filters) {
            self.filters.push(filter);
        }
        self
    }
}

/// Nested filter scope produced by [`QueryBuilder::group`]
#[derive(Debug, Clone)]
pub struct FilterGroup {
    pub(crate) op: FilterOp,
    pub(crate) filters: Vec<Filter>,
    pub(crate) error: Option<OrmError>,
}

impl FilterGroup {
    pub(crate) fn new(op: FilterOp) -> Self {
        Self {
            op,
            filters: Vec::new(),
            error: None,
        }
    }

    pub fn filter(mut self, column: &str, comparator: Comparator, value: impl Into<Value>) -> Self {
        self.filters
            .push(Filter::comparison(FieldRef::parse(column), comparator, value));
        self
    }

    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, Comparator::Equal, value)
    }

    pub fn where_ne(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, Comparator::NotEqual, value)
    }

    pub fn where_gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, Comparator::GreaterThan, value)
    }

    pub fn where_lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, Comparator::LessThan, value)
    }

    pub fn where_in(mut self, column: &str, values: Vec<Value>) -> Self {
        self.filters.push(Filter::Value {
            field: FieldRef::parse(column),
            comparator: Comparator::In,
            value: Value::Array(values),
        });
        self
    }

    pub fn where_null(mut self, column: &str) -> Self {
        self.filters.push(Filter::Value {
            field: FieldRef::parse(column),
            comparator: Comparator::IsNull,
            value: Value::Null,
        });
        self
    }

    /// Nest a further group inside this one
    pub fn group<F>(mut self, op: FilterOp, f: F) -> Self
    where
        F: FnOnce(FilterGroup) -> FilterGroup,
    {
        let built = f(FilterGroup::new(op));
        if let Some(err) = built.error {
            if self.error.is_none() {
                self.error = Some(err);
            }
        } else if let Some(filter) = Filter::group(built.op, built.filters) {
            self.filters.push(filter);
        }
        self
    }
}

impl IdValue {
    /// Expand an identifier into a filter over the given key columns.
    /// Validates arity: a simple value needs exactly one column, a composite
    /// id must supply a value for every column.
    pub fn to_filter(&self, columns: &[&str]) -> Result<Filter, OrmError> {
        match self {
            IdValue::Simple(value) => {
                if columns.len() != 1 {
                    return Err(FieldError::UnsupportedFilter {
                        message: format!(
                            "simple identifier supplied for composite key ({})",
                            columns.join(", ")
                        ),
                    }
                    .into());
                }
                Ok(Filter::eq(FieldRef::new(columns[0]), value.clone()))
            }
            IdValue::Composite(parts) => {
                let mut filters = Vec::with_capacity(columns.len());
                for column in columns {
                    let value = parts
                        .iter()
                        .find(|(name, _)| name == column)
                        .map(|(_, v)| v.clone())
                        .ok_or_else(|| FieldError::UnsupportedFilter {
                            message: format!(
                                "composite identifier is missing key component `{column}`"
                            ),
                        })?;
                    if value.is_null() {
                        return Err(FieldError::UnsupportedFilter {
                            message: format!(
                                "composite identifier component `{column}` is null"
                            ),
                        }
                        .into());
                    }
                    filters.push(Filter::eq(FieldRef::new(*column), value));
                }
                Filter::group(FilterOp::And, filters).ok_or_else(|| {
                    FieldError::UnsupportedFilter {
                        message: "empty composite identifier".into(),
                    }
                    .into()
                })
            }
        }
    }
}
