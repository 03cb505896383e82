//! Page slicing over a query.

use crate::error::AppError;
use crate::query::Query;
use crate::value::Record;

/// Largest offset any engine accepts (PostgreSQL takes a signed 64-bit OFFSET).
pub const MAX_OFFSET: u64 = i64::MAX as u64;

pub struct Paginator {
    query: Query,
    page_number: u64,
    page_size: u64,
}

impl Paginator {
    /// Page numbers start at 1; zero is clamped up. Page size is at least 1.
    pub fn new(query: Query, page_number: u64, page_size: u64) -> Self {
        Paginator {
            query,
            page_number: page_number.max(1),
            page_size: page_size.max(1),
        }
    }

    pub fn page_number(&self) -> u64 {
        self.page_number
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Saturates at [`MAX_OFFSET`]; a page that far out is simply empty.
    pub fn offset(&self) -> u64 {
        self.page_size
            .saturating_mul(self.page_number - 1)
            .min(MAX_OFFSET)
    }

    pub async fn total_count(&self) -> Result<u64, AppError> {
        self.query.count().await
    }

    pub async fn items(&self) -> Result<Vec<Record>, AppError> {
        self.query.slice(self.offset(), self.page_size).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{Adapter, MemoryAdapter, MemoryStore};
    use crate::model::{ColumnDef, ColumnKind, ModelSchema, ENGINE_MEMORY};
    use std::sync::Arc;

    async fn query_with_rows(n: usize) -> Query {
        let schema = ModelSchema::new("items", ENGINE_MEMORY).column(ColumnDef::new("name", ColumnKind::Char));
        let adapter = Arc::new(MemoryAdapter::new(schema, MemoryStore::new()));
        for i in 0..n {
            let mut r = adapter.create_object();
            r.set("name", format!("item{}", i));
            adapter.save(&mut r).await.unwrap();
        }
        Query::new(adapter, Vec::new(), Vec::new())
    }

    #[tokio::test]
    async fn offset_follows_page_number() {
        let p = Paginator::new(query_with_rows(0).await, 3, 20);
        assert_eq!(p.offset(), 40);
        let p = Paginator::new(query_with_rows(0).await, 0, 0);
        assert_eq!(p.page_number(), 1);
        assert_eq!(p.page_size(), 1);
        assert_eq!(p.offset(), 0);
    }

    #[tokio::test]
    async fn far_pages_saturate_and_are_empty() {
        let p = Paginator::new(query_with_rows(2).await, u64::MAX, 20);
        assert_eq!(p.offset(), MAX_OFFSET);
        assert!(p.items().await.unwrap().is_empty());
        assert_eq!(p.total_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn last_page_is_partial_and_count_is_unsliced() {
        let p = Paginator::new(query_with_rows(5).await, 2, 3);
        assert_eq!(p.total_count().await.unwrap(), 5);
        let items = p.items().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].value("name").as_str(), Some("item3"));
    }
}
