//! Query Builder ORDER BY operations

use crate::model::Model;
use crate::query::builder::QueryBuilder;
use crate::query::types::*;

impl<M: Model> QueryBuilder<M> {
    /// Add a sort key
    pub fn order_by(mut self, column: &str, direction: OrderDirection) -> Self {
        self.sorts.push(SortKey {
            field: FieldRef::parse(column),
            direction,
        });
        self
    }

    /// Ascending sort shorthand
    pub fn order_by_asc(self, column: &str) -> Self {
        self.order_by(column, OrderDirection::Asc)
    }

    /// Descending sort shorthand
    pub fn order_by_desc(self, column: &str) -> Self {
        self.order_by(column, OrderDirection::Desc)
    }
}
