//! Unevaluated query handle: filters and ordering bound to an adapter, executed on demand.

use crate::adapters::Adapter;
use crate::error::AppError;
use crate::filter::Filter;
use crate::value::Record;
use std::fmt;
use std::sync::Arc;

/// Row window `[offset, offset + limit)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slice {
    pub offset: u64,
    pub limit: u64,
}

impl Slice {
    pub fn new(offset: u64, limit: u64) -> Self {
        Slice { offset, limit }
    }

    pub fn first() -> Self {
        Slice { offset: 0, limit: 1 }
    }
}

#[derive(Clone)]
pub struct Query {
    adapter: Arc<dyn Adapter>,
    filters: Vec<Filter>,
    ordering: Vec<String>,
}

impl Query {
    pub fn new(adapter: Arc<dyn Adapter>, filters: Vec<Filter>, ordering: Vec<String>) -> Self {
        Query {
            adapter,
            filters,
            ordering,
        }
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Count of the whole, unsliced result.
    pub async fn count(&self) -> Result<u64, AppError> {
        self.adapter.count(&self.filters).await
    }

    pub async fn slice(&self, offset: u64, limit: u64) -> Result<Vec<Record>, AppError> {
        self.adapter
            .select(&self.filters, &self.ordering, Some(Slice::new(offset, limit)))
            .await
    }

    pub async fn first(&self) -> Result<Option<Record>, AppError> {
        Ok(self.slice(0, 1).await?.into_iter().next())
    }

    pub async fn all(&self) -> Result<Vec<Record>, AppError> {
        self.adapter.select(&self.filters, &self.ordering, None).await
    }

    /// Bulk delete of every matching row; returns the affected-row count.
    pub async fn delete(&self) -> Result<u64, AppError> {
        self.adapter.delete(&self.filters).await
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("engine", &self.adapter.engine())
            .field("filters", &self.filters)
            .field("ordering", &self.ordering)
            .finish()
    }
}
