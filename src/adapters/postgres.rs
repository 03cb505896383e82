//! PostgreSQL engine: runs builder SQL through a pool and decodes rows by column kind.

use super::Adapter;
use crate::error::AppError;
use crate::filter::Filter;
use crate::model::{ColumnDef, ColumnKind, ModelSchema, ENGINE_POSTGRES};
use crate::query::Slice;
use crate::sql::{self, PgBindValue, QueryBuf};
use crate::value::{AttrValue, Record};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

pub struct PgAdapter {
    pool: PgPool,
    schema: ModelSchema,
}

impl PgAdapter {
    pub fn new(pool: PgPool, schema: ModelSchema) -> Self {
        PgAdapter { pool, schema }
    }

    /// Create the model table when missing.
    pub async fn create_table(&self) -> Result<(), AppError> {
        let ddl = sql::create_table(&self.schema);
        tracing::info!(table = %self.schema.table, "create table");
        tracing::debug!(sql = %ddl, "ddl");
        sqlx::query(&ddl).execute(&self.pool).await?;
        Ok(())
    }

    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<Record>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_attr(p));
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|r| row_to_record(r, &self.schema)).collect())
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<Record>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_attr(p));
        }
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.map(|r| row_to_record(&r, &self.schema)))
    }
}

#[async_trait]
impl Adapter for PgAdapter {
    fn engine(&self) -> &str {
        ENGINE_POSTGRES
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
        let q = sql::select(&self.schema, filters, ordering, slice);
        self.fetch_all(&q).await
    }

    async fn count(&self, filters: &[Filter]) -> Result<u64, AppError> {
        let q = sql::count(&self.schema, filters);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_attr(p));
        }
        let n = query.fetch_one(&self.pool).await?;
        Ok(n.max(0) as u64)
    }

    async fn save(&self, obj: &mut Record) -> Result<(), AppError> {
        let pk = self.schema.primary_key.clone();
        let q = if obj.is_unset(&pk) {
            sql::insert(&self.schema, obj)
        } else {
            sql::update(&self.schema, obj)
        };
        let saved = self
            .fetch_optional(&q)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
        for (name, value) in saved.iter() {
            obj.set(name.clone(), value.clone());
        }
        Ok(())
    }

    async fn delete(&self, filters: &[Filter]) -> Result<u64, AppError> {
        let q = sql::delete(&self.schema, filters);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_attr(p));
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn ensure_storage(&self) -> Result<(), AppError> {
        self.create_table().await
    }
}

fn row_to_record(row: &PgRow, schema: &ModelSchema) -> Record {
    let mut rec = Record::new();
    for col in &schema.columns {
        rec.set(col.name.clone(), cell_to_attr(row, col));
    }
    rec
}

fn cell_to_attr(row: &PgRow, col: &ColumnDef) -> AttrValue {
    let name = col.name.as_str();
    match col.kind {
        ColumnKind::AutoKey | ColumnKind::Integer | ColumnKind::ForeignKey => {
            if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
                return AttrValue::Int(n);
            }
            if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
                return AttrValue::Int(n.into());
            }
            if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
                return AttrValue::Int(n.into());
            }
        }
        ColumnKind::Float => {
            if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
                return AttrValue::Float(n);
            }
            if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
                return AttrValue::Float(n.into());
            }
        }
        ColumnKind::Boolean => {
            if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
                return AttrValue::Bool(b);
            }
        }
        ColumnKind::Timestamp => {
            if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
                return AttrValue::DateTime(d);
            }
            if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
                return AttrValue::DateTime(d.naive_utc());
            }
        }
        ColumnKind::Date => {
            if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
                return AttrValue::Date(d);
            }
        }
        ColumnKind::Char | ColumnKind::Text | ColumnKind::Url => {
            if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
                return AttrValue::Text(s);
            }
            if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
                return AttrValue::Text(u.to_string());
            }
        }
    }
    if let Ok(Some(j)) = row.try_get::<Option<serde_json::Value>, _>(name) {
        return AttrValue::Json(j);
    }
    AttrValue::Null
}
