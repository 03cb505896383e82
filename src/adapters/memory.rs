//! In-process engine: tables held in a shared store, rows kept in insertion order.

use super::Adapter;
use crate::error::AppError;
use crate::filter::Filter;
use crate::model::{ColumnKind, ModelSchema, ENGINE_MEMORY};
use crate::query::Slice;
use crate::value::{AttrValue, Record};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Table {
    rows: Vec<Record>,
    next_id: i64,
}

/// Shared table storage. Clones see the same tables.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, Table>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.read().get(table).map(|t| t.rows.len()).unwrap_or(0)
    }

    /// Drop every row and reset key sequences.
    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Table>> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Table>> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }
}

pub struct MemoryAdapter {
    schema: ModelSchema,
    store: MemoryStore,
}

impl MemoryAdapter {
    pub fn new(schema: ModelSchema, store: MemoryStore) -> Self {
        MemoryAdapter { schema, store }
    }

    fn matching<'a>(rows: &'a [Record], filters: &'a [Filter]) -> impl Iterator<Item = &'a Record> {
        rows.iter().filter(move |r| filters.iter().all(|f| f.matches(r)))
    }

    fn sort(&self, rows: &mut [Record], ordering: &[String]) {
        let default_order = [self.schema.primary_key.clone()];
        let ordering = if ordering.is_empty() { &default_order[..] } else { ordering };
        rows.sort_by(|a, b| {
            for key in ordering {
                let (name, desc) = match key.strip_prefix('-') {
                    Some(name) => (name, true),
                    None => (key.as_str(), false),
                };
                let ord = a.value(name).compare(&b.value(name)).unwrap_or(Ordering::Equal);
                let ord = if desc { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    fn engine(&self) -> &str {
        ENGINE_MEMORY
    }

    fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    async fn select(
        &self,
        filters: &[Filter],
        ordering: &[String],
        slice: Option<Slice>,
    ) -> Result<Vec<Record>, AppError> {
        let tables = self.store.read();
        let Some(table) = tables.get(&self.schema.table) else {
            return Ok(Vec::new());
        };
        let mut rows: Vec<Record> = Self::matching(&table.rows, filters).cloned().collect();
        drop(tables);
        self.sort(&mut rows, ordering);
        Ok(match slice {
            Some(s) => rows
                .into_iter()
                .skip(usize::try_from(s.offset).unwrap_or(usize::MAX))
                .take(usize::try_from(s.limit).unwrap_or(usize::MAX))
                .collect(),
            None => rows,
        })
    }

    async fn count(&self, filters: &[Filter]) -> Result<u64, AppError> {
        let tables = self.store.read();
        Ok(tables
            .get(&self.schema.table)
            .map(|t| Self::matching(&t.rows, filters).count() as u64)
            .unwrap_or(0))
    }

    async fn save(&self, obj: &mut Record) -> Result<(), AppError> {
        let pk = self.schema.primary_key.as_str();
        let auto_key = self
            .schema
            .pk_column()
            .map(|c| c.kind == ColumnKind::AutoKey)
            .unwrap_or(false);
        let mut tables = self.store.write();
        let table = tables.entry(self.schema.table.clone()).or_default();

        if obj.is_unset(pk) {
            if !auto_key {
                return Err(AppError::NoPrimaryKey);
            }
            table.next_id += 1;
            obj.set(pk, AttrValue::Int(table.next_id));
            tracing::debug!(table = %self.schema.table, id = table.next_id, "memory insert");
            table.rows.push(obj.clone());
            return Ok(());
        }

        let key = obj.value(pk);
        match table
            .rows
            .iter_mut()
            .find(|r| r.value(pk).compare(&key) == Some(Ordering::Equal))
        {
            Some(row) => *row = obj.clone(),
            None => {
                if let AttrValue::Int(id) = key {
                    table.next_id = table.next_id.max(id);
                }
                table.rows.push(obj.clone());
            }
        }
        Ok(())
    }

    async fn delete(&self, filters: &[Filter]) -> Result<u64, AppError> {
        let mut tables = self.store.write();
        let Some(table) = tables.get_mut(&self.schema.table) else {
            return Ok(0);
        };
        let before = table.rows.len();
        table.rows.retain(|r| !filters.iter().all(|f| f.matches(r)));
        let affected = (before - table.rows.len()) as u64;
        tracing::debug!(table = %self.schema.table, affected, "memory delete");
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Operator;
    use crate::model::ColumnDef;

    fn adapter() -> MemoryAdapter {
        let schema = ModelSchema::new("users", ENGINE_MEMORY)
            .column(ColumnDef::new("name", ColumnKind::Char))
            .column(ColumnDef::new("age", ColumnKind::Integer));
        MemoryAdapter::new(schema, MemoryStore::new())
    }

    async fn seed(a: &MemoryAdapter) {
        for (name, age) in [("ann", 30), ("bob", 20), ("cid", 40)] {
            let mut r = a.create_object().with("name", name).with("age", age as i64);
            a.save(&mut r).await.unwrap();
        }
    }

    #[tokio::test]
    async fn insert_assigns_sequential_keys() {
        let a = adapter();
        seed(&a).await;
        let rows = a.select(&[], &[], None).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.value("id")).collect();
        assert_eq!(ids, vec![AttrValue::Int(1), AttrValue::Int(2), AttrValue::Int(3)]);
    }

    #[tokio::test]
    async fn save_with_key_updates_in_place() {
        let a = adapter();
        seed(&a).await;
        let mut bob = a.select(&[Filter::exact("id", 2i64)], &[], None).await.unwrap().remove(0);
        bob.set("age", 21i64);
        a.save(&mut bob).await.unwrap();
        assert_eq!(a.count(&[]).await.unwrap(), 3);
        let rows = a.select(&[Filter::exact("name", "bob")], &[], None).await.unwrap();
        assert_eq!(rows[0].value("age"), AttrValue::Int(21));
    }

    #[tokio::test]
    async fn ordering_and_slicing() {
        let a = adapter();
        seed(&a).await;
        let rows = a
            .select(&[], &["-age".to_string()], Some(Slice::new(1, 5)))
            .await
            .unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.value("name")).collect();
        assert_eq!(names, vec![AttrValue::from("ann"), AttrValue::from("bob")]);
    }

    #[tokio::test]
    async fn delete_reports_affected_rows() {
        let a = adapter();
        seed(&a).await;
        let gt = Filter::new("age", Operator::Gt, AttrValue::Int(25));
        assert_eq!(a.delete(&[gt.clone()]).await.unwrap(), 2);
        assert_eq!(a.delete(&[gt]).await.unwrap(), 0);
        assert_eq!(a.count(&[]).await.unwrap(), 1);
    }
}
