//! Persistence adapters: translate resource filters and CRUD into a concrete engine.
//!
//! A model resource is bound to exactly one adapter. It is either injected explicitly or
//! detected through an [`AdapterRegistry`], where the first registered engine matching the
//! model wins.

mod memory;
mod postgres;

pub use memory::{MemoryAdapter, MemoryStore};
pub use postgres::PgAdapter;

use crate::error::{AppError, ConfigError};
use crate::fields::Field;
use crate::filter::Filter;
use crate::model::{ColumnDef, ColumnKind, ModelSchema, ENGINE_MEMORY, ENGINE_POSTGRES};
use crate::query::Slice;
use crate::resource::ModelResource;
use crate::value::{AttrValue, Record};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

#[async_trait]
pub trait Adapter: Send + Sync {
    /// Engine tag this adapter serves (matches `ModelSchema::engine`).
    fn engine(&self) -> &str;

    fn schema(&self) -> &ModelSchema;

    /// Matching rows; `ordering` holds attribute names, `-` prefix for descending.
    async fn select(
        &self,
        filters: &[Filter],
        ordering: &[String],
        slice: Option<Slice>,
    ) -> Result<Vec<Record>, AppError>;

    async fn count(&self, filters: &[Filter]) -> Result<u64, AppError>;

    /// Insert when the primary key is unset (storing the generated key), update otherwise.
    async fn save(&self, obj: &mut Record) -> Result<(), AppError>;

    /// Delete matching rows; returns the affected-row count.
    async fn delete(&self, filters: &[Filter]) -> Result<u64, AppError>;

    /// Create backing storage for the model when the engine needs it.
    async fn ensure_storage(&self) -> Result<(), AppError> {
        Ok(())
    }

    /// New unsaved object with column defaults applied.
    fn create_object(&self) -> Record {
        let mut obj = Record::new();
        for col in &self.schema().columns {
            if let Some(default) = &col.default {
                obj.set(col.name.clone(), AttrValue::from_json(default));
            }
        }
        obj
    }

    /// Resource fields derived from the model columns, minus `excludes`. Foreign keys become
    /// relation fields when the referenced model is present in `related`.
    fn get_fields(
        &self,
        excludes: &HashSet<String>,
        related: &HashMap<String, Arc<ModelResource>>,
    ) -> BTreeMap<String, Field> {
        let schema = self.schema();
        schema
            .columns
            .iter()
            .filter(|c| !excludes.contains(&c.name))
            .map(|c| (c.name.clone(), field_for_column(schema, c, related)))
            .collect()
    }
}

fn field_for_column(
    schema: &ModelSchema,
    col: &ColumnDef,
    related: &HashMap<String, Arc<ModelResource>>,
) -> Field {
    let name = col.name.clone();
    let mut field = match col.kind {
        ColumnKind::AutoKey => Field::integer(name).readonly(),
        ColumnKind::Integer => Field::integer(name),
        ColumnKind::Float => Field::float(name),
        ColumnKind::Char => Field::char(name),
        ColumnKind::Text => Field::text(name),
        ColumnKind::Boolean => Field::boolean(name),
        ColumnKind::Timestamp => Field::datetime(name),
        ColumnKind::Date => Field::date(name),
        ColumnKind::Url => Field::url(name),
        ColumnKind::ForeignKey => match col.references.as_ref().and_then(|r| related.get(r)) {
            Some(rel) => Field::foreign_key(name, rel.clone()),
            None => Field::integer(name),
        },
    };
    if col.nullable {
        field = field.nullable();
    }
    if !col.nullable && !col.has_default() {
        field = field.required();
    }
    if col.name == schema.primary_key {
        field = field.primary_key();
    }
    field
}

pub type AdapterFactory = Box<dyn Fn(ModelSchema) -> Arc<dyn Adapter> + Send + Sync>;

/// Ordered set of installed engines. Detection order is registration order.
#[derive(Default)]
pub struct AdapterRegistry {
    entries: Vec<(String, AdapterFactory)>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, engine: impl Into<String>, factory: AdapterFactory) -> Self {
        self.entries.push((engine.into(), factory));
        self
    }

    pub fn with_postgres(self, pool: PgPool) -> Self {
        self.register(
            ENGINE_POSTGRES,
            Box::new(move |schema| Arc::new(PgAdapter::new(pool.clone(), schema)) as Arc<dyn Adapter>),
        )
    }

    pub fn with_memory(self, store: MemoryStore) -> Self {
        self.register(
            ENGINE_MEMORY,
            Box::new(move |schema| Arc::new(MemoryAdapter::new(schema, store.clone())) as Arc<dyn Adapter>),
        )
    }

    /// PostgreSQL (primary, when a pool is available) checked before memory (secondary).
    pub fn standard(pool: Option<PgPool>, store: MemoryStore) -> Self {
        let registry = Self::new();
        let registry = match pool {
            Some(pool) => registry.with_postgres(pool),
            None => registry,
        };
        registry.with_memory(store)
    }

    pub fn engines(&self) -> Vec<&str> {
        self.entries.iter().map(|(e, _)| e.as_str()).collect()
    }

    pub fn detect(&self, schema: &ModelSchema) -> Result<Arc<dyn Adapter>, ConfigError> {
        self.entries
            .iter()
            .find(|(engine, _)| *engine == schema.engine)
            .map(|(_, factory)| factory(schema.clone()))
            .ok_or_else(|| ConfigError::NoAdapter {
                model: schema.name.clone(),
                engine: schema.engine.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldKind;
    use serde_json::json;

    fn users() -> ModelSchema {
        ModelSchema::new("users", ENGINE_MEMORY)
            .column(ColumnDef::new("name", ColumnKind::Char))
            .column(ColumnDef::new("is_active", ColumnKind::Boolean).default(json!(false)))
            .column(ColumnDef::new("modification_date", ColumnKind::Timestamp).nullable())
    }

    #[test]
    fn detection_fails_without_a_matching_engine() {
        let registry = AdapterRegistry::new().with_memory(MemoryStore::new());
        let schema = ModelSchema::new("users", "mysql");
        assert!(matches!(
            registry.detect(&schema),
            Err(ConfigError::NoAdapter { ref engine, .. }) if engine == "mysql"
        ));
    }

    #[tokio::test]
    async fn first_registered_engine_wins() {
        let first = MemoryStore::new();
        let second = MemoryStore::new();
        let registry = AdapterRegistry::new()
            .with_memory(first.clone())
            .with_memory(second.clone());
        assert_eq!(registry.engines(), vec!["memory", "memory"]);
        let adapter = registry.detect(&users()).unwrap();
        let mut obj = adapter.create_object();
        obj.set("name", "a");
        adapter.save(&mut obj).await.unwrap();
        assert_eq!(first.row_count("users"), 1);
        assert_eq!(second.row_count("users"), 0);
    }

    #[test]
    fn derived_fields_follow_column_metadata() {
        let adapter = MemoryAdapter::new(users(), MemoryStore::new());
        let mut excludes = HashSet::new();
        excludes.insert("modification_date".to_string());
        let fields = adapter.get_fields(&excludes, &HashMap::new());
        assert_eq!(fields.len(), 3);
        let id = &fields["id"];
        assert!(id.pk && id.readonly && !id.required);
        assert!(fields["name"].required);
        assert!(!fields["is_active"].required);
        assert!(matches!(fields["is_active"].kind, FieldKind::Boolean));
    }

    #[test]
    fn create_object_applies_defaults() {
        let adapter = MemoryAdapter::new(users(), MemoryStore::new());
        let obj = adapter.create_object();
        assert_eq!(obj.value("is_active"), AttrValue::Bool(false));
        assert!(obj.is_unset("id"));
    }
}
