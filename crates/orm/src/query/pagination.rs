//! Query Builder pagination operations
//!
//! `paginate` issues the item query and the parallel count query from the
//! same filter tree. Degenerate page/per inputs are clamped rather than fed
//! into offset arithmetic: negative or zero pages read as page 1, negative
//! per-page reads as 0 and yields an empty page.

use crate::error::OrmResult;
use crate::model::Model;
use crate::query::builder::QueryBuilder;
use crate::query::types::QueryRange;

/// One page of results plus the total row count
#[derive(Debug, Clone)]
pub struct Page<M> {
    pub items: Vec<M>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

impl<M> Page<M> {
    /// Number of pages at the current page size; 0 when per_page is 0
    pub fn page_count(&self) -> u64 {
        if self.per_page == 0 {
            0
        } else {
            self.total.div_ceil(self.per_page)
        }
    }
}

impl<M: Model> QueryBuilder<M> {
    /// Add a LIMIT clause
    pub fn limit(mut self, count: u64) -> Self {
        let offset = self.range.map(|r| r.offset).unwrap_or(0);
        self.range = Some(QueryRange {
            offset,
            limit: Some(count),
        });
        self
    }

    /// Add an OFFSET clause
    pub fn offset(mut self, count: u64) -> Self {
        let limit = self.range.and_then(|r| r.limit);
        self.range = Some(QueryRange {
            offset: count,
            limit,
        });
        self
    }

    /// Set both offset and limit at once
    pub fn range(mut self, offset: u64, limit: u64) -> Self {
        self.range = Some(QueryRange {
            offset,
            limit: Some(limit),
        });
        self
    }

    /// Fetch one page of results alongside the total count
    pub async fn paginate(self, page: i64, per_page: i64) -> OrmResult<Page<M>> {
        let page = page.max(1) as u64;
        let per_page = per_page.max(0) as u64;
        let offset = page.saturating_sub(1).saturating_mul(per_page);

        let count_builder = self.clone();
        let items_builder = self.range(offset, per_page);

        let (total, items) = if per_page == 0 {
            (count_builder.count().await?, Vec::new())
        } else {
            tokio::try_join!(count_builder.count(), items_builder.all())?
        };

        Ok(Page {
            items,
            total,
            page,
            per_page,
        })
    }

    /// Walk the full result set in fixed-size chunks, invoking the callback
    /// once per non-empty chunk
    pub async fn chunk<F, Fut>(self, size: u64, mut f: F) -> OrmResult<()>
    where
        F: FnMut(Vec<M>) -> Fut,
        Fut: std::future::Future<Output = OrmResult<()>>,
    {
        if size == 0 {
            return Ok(());
        }
        let mut offset = 0u64;
        loop {
            let batch = self.clone().range(offset, size).all().await?;
            let fetched = batch.len() as u64;
            if batch.is_empty() {
                return Ok(());
            }
            f(batch).await?;
            if fetched < size {
                return Ok(());
            }
            offset = offset.saturating_add(size);
        }
    }
}
