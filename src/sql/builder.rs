//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE and CREATE TABLE from a model schema.

use crate::filter::{is_truthy, Filter, FilterValue, Operator};
use crate::model::{ColumnDef, ColumnKind, ModelSchema};
use crate::query::Slice;
use crate::value::{AttrValue, Record};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from model metadata).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Table name, schema-qualified when written as `schema.table`.
fn qualified_table(table: &str) -> String {
    table.split('.').map(quoted).collect::<Vec<_>>().join(".")
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<AttrValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: AttrValue) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }
}

/// Cast target used for every bound parameter so NULLs and loosely typed values bind correctly.
pub fn pg_cast(kind: &ColumnKind) -> &'static str {
    match kind {
        ColumnKind::AutoKey | ColumnKind::Integer | ColumnKind::ForeignKey => "int8",
        ColumnKind::Float => "float8",
        ColumnKind::Char | ColumnKind::Text | ColumnKind::Url => "text",
        ColumnKind::Boolean => "bool",
        ColumnKind::Timestamp => "timestamp",
        ColumnKind::Date => "date",
    }
}

fn placeholder(q: &mut QueryBuf, col: &ColumnDef, v: AttrValue) -> String {
    let n = q.push_param(v);
    format!("${}::{}", n, pg_cast(&col.kind))
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn select_column_list(schema: &ModelSchema) -> String {
    schema
        .columns
        .iter()
        .map(|c| quoted(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// WHERE clause for the filters; filters naming unknown columns are skipped.
fn where_clause(schema: &ModelSchema, filters: &[Filter], q: &mut QueryBuf) -> String {
    let mut parts = Vec::new();
    for f in filters {
        let Some(col) = schema.column_by_name(&f.field) else {
            tracing::debug!(field = %f.field, "filter on unknown column skipped");
            continue;
        };
        let name = quoted(&col.name);
        let part = match (&f.op, &f.value) {
            (Operator::In, FilterValue::Many(values)) => {
                if values.is_empty() {
                    "FALSE".to_string()
                } else {
                    let phs: Vec<String> = values.iter().map(|v| placeholder(q, col, v.clone())).collect();
                    format!("{} IN ({})", name, phs.join(", "))
                }
            }
            (_, FilterValue::Many(_)) => "FALSE".to_string(),
            (Operator::IsNull, FilterValue::One(v)) => {
                if is_truthy(v) {
                    format!("{} IS NULL", name)
                } else {
                    format!("{} IS NOT NULL", name)
                }
            }
            (Operator::Exact, FilterValue::One(AttrValue::Null)) => format!("{} IS NULL", name),
            (op @ (Operator::Contains | Operator::StartsWith | Operator::EndsWith), FilterValue::One(v)) => {
                let text = escape_like(&v.to_text().unwrap_or_default());
                let pattern = match op {
                    Operator::Contains => format!("%{}%", text),
                    Operator::StartsWith => format!("{}%", text),
                    _ => format!("%{}", text),
                };
                let n = q.push_param(AttrValue::Text(pattern));
                format!("{}::text LIKE ${}::text", name, n)
            }
            (op, FilterValue::One(v)) => {
                let sym = match op {
                    Operator::Gt => ">",
                    Operator::Gte => ">=",
                    Operator::Lt => "<",
                    Operator::Lte => "<=",
                    _ => "=",
                };
                let ph = placeholder(q, col, v.clone());
                format!("{} {} {}", name, sym, ph)
            }
        };
        parts.push(part);
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

/// ORDER BY from attribute names (`-` for descending); defaults to the primary key.
fn order_clause(schema: &ModelSchema, ordering: &[String]) -> String {
    let mut parts: Vec<String> = ordering
        .iter()
        .filter_map(|key| {
            let (name, dir) = match key.strip_prefix('-') {
                Some(name) => (name, " DESC"),
                None => (key.as_str(), ""),
            };
            schema.column_by_name(name).map(|c| format!("{}{}", quoted(&c.name), dir))
        })
        .collect();
    if parts.is_empty() {
        parts.push(quoted(&schema.primary_key));
    }
    format!(" ORDER BY {}", parts.join(", "))
}

/// SELECT with filters, ordering and optional LIMIT/OFFSET.
pub fn select(schema: &ModelSchema, filters: &[Filter], ordering: &[String], slice: Option<Slice>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(schema, filters, &mut q);
    let slice_sql = slice
        .map(|s| format!(" LIMIT {} OFFSET {}", s.limit, s.offset))
        .unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{}{}{}",
        select_column_list(schema),
        qualified_table(&schema.table),
        where_sql,
        order_clause(schema, ordering),
        slice_sql
    );
    q
}

pub fn count(schema: &ModelSchema, filters: &[Filter]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(schema, filters, &mut q);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", qualified_table(&schema.table), where_sql);
    q
}

/// INSERT of the attributes set on `obj`; an unset auto key is left to the database.
pub fn insert(schema: &ModelSchema, obj: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &schema.columns {
        let Some(v) = obj.get(&c.name) else { continue };
        if c.kind == ColumnKind::AutoKey && v.is_null() {
            continue;
        }
        cols.push(quoted(&c.name));
        placeholders.push(placeholder(&mut q, c, v.clone()));
    }
    let table = qualified_table(&schema.table);
    let returning = select_column_list(schema);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by primary key: SET every non-key attribute present on `obj`.
pub fn update(schema: &ModelSchema, obj: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(&schema.table);
    let pk = &schema.primary_key;
    let mut sets = Vec::new();
    for c in &schema.columns {
        if c.name == *pk {
            continue;
        }
        let Some(v) = obj.get(&c.name) else { continue };
        let ph = placeholder(&mut q, c, v.clone());
        sets.push(format!("{} = {}", quoted(&c.name), ph));
    }
    let returning = select_column_list(schema);
    let pk_ph = match schema.pk_column() {
        Some(col) => placeholder(&mut q, col, obj.value(pk)),
        None => format!("${}", q.push_param(obj.value(pk))),
    };
    q.sql = if sets.is_empty() {
        format!("SELECT {} FROM {} WHERE {} = {}", returning, table, quoted(pk), pk_ph)
    } else {
        format!(
            "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
            table,
            sets.join(", "),
            quoted(pk),
            pk_ph,
            returning
        )
    };
    q
}

/// DELETE every row matching the filters.
pub fn delete(schema: &ModelSchema, filters: &[Filter]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(schema, filters, &mut q);
    q.sql = format!("DELETE FROM {}{}", qualified_table(&schema.table), where_sql);
    q
}

fn ddl_type(kind: &ColumnKind) -> &'static str {
    match kind {
        ColumnKind::AutoKey => "BIGSERIAL",
        ColumnKind::Integer | ColumnKind::ForeignKey => "BIGINT",
        ColumnKind::Float => "DOUBLE PRECISION",
        ColumnKind::Char => "VARCHAR(255)",
        ColumnKind::Text | ColumnKind::Url => "TEXT",
        ColumnKind::Boolean => "BOOLEAN",
        ColumnKind::Timestamp => "TIMESTAMP",
        ColumnKind::Date => "DATE",
    }
}

fn ddl_default(v: &Value) -> Option<String> {
    match v {
        Value::Null => Some("NULL".into()),
        Value::Bool(b) => Some(if *b { "TRUE".into() } else { "FALSE".into() }),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// CREATE TABLE IF NOT EXISTS for bootstrapping a database from the model.
pub fn create_table(schema: &ModelSchema) -> String {
    let cols: Vec<String> = schema
        .columns
        .iter()
        .map(|c| {
            let mut def = format!("{} {}", quoted(&c.name), ddl_type(&c.kind));
            if c.name == schema.primary_key {
                def.push_str(" PRIMARY KEY");
            } else if !c.nullable {
                def.push_str(" NOT NULL");
            }
            if let Some(d) = c.default.as_ref().and_then(ddl_default) {
                def.push_str(" DEFAULT ");
                def.push_str(&d);
            }
            def
        })
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        qualified_table(&schema.table),
        cols.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ENGINE_POSTGRES;
    use serde_json::json;

    fn users() -> ModelSchema {
        ModelSchema::new("users", ENGINE_POSTGRES)
            .table("app.users")
            .column(ColumnDef::new("name", ColumnKind::Char))
            .column(ColumnDef::new("is_active", ColumnKind::Boolean).default(json!(false)))
    }

    #[test]
    fn select_binds_filters_in_order() {
        let filters = vec![
            Filter::new("name", Operator::StartsWith, "te_st".into()),
            Filter::new("id", Operator::Gte, AttrValue::Int(2)),
            Filter::new("is_active", Operator::IsNull, AttrValue::Bool(false)),
            Filter::exact("nope", "x"),
        ];
        let q = select(&users(), &filters, &["-name".into()], Some(Slice::new(20, 10)));
        assert_eq!(
            q.sql,
            "SELECT \"id\", \"name\", \"is_active\" FROM \"app\".\"users\" \
             WHERE \"name\"::text LIKE $1::text AND \"id\" >= $2::int8 AND \"is_active\" IS NOT NULL \
             ORDER BY \"name\" DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(q.params, vec![AttrValue::Text("te\\_st%".into()), AttrValue::Int(2)]);
    }

    #[test]
    fn in_expands_placeholders() {
        let q = count(&users(), &[Filter::is_in("id", vec![AttrValue::Int(1), AttrValue::Int(3)])]);
        assert_eq!(
            q.sql,
            "SELECT COUNT(*) FROM \"app\".\"users\" WHERE \"id\" IN ($1::int8, $2::int8)"
        );
        let q = count(&users(), &[Filter::is_in("id", vec![])]);
        assert!(q.sql.ends_with("WHERE FALSE"));
    }

    #[test]
    fn insert_leaves_unset_auto_key_to_database() {
        let obj = Record::new().with("name", "a").with("is_active", true);
        let q = insert(&users(), &obj);
        assert_eq!(
            q.sql,
            "INSERT INTO \"app\".\"users\" (\"name\", \"is_active\") VALUES ($1::text, $2::bool) \
             RETURNING \"id\", \"name\", \"is_active\""
        );
    }

    #[test]
    fn update_targets_primary_key_last() {
        let obj = Record::new().with("id", 7i64).with("name", "b");
        let q = update(&users(), &obj);
        assert_eq!(
            q.sql,
            "UPDATE \"app\".\"users\" SET \"name\" = $1::text WHERE \"id\" = $2::int8 \
             RETURNING \"id\", \"name\", \"is_active\""
        );
        assert_eq!(q.params[1], AttrValue::Int(7));
    }

    #[test]
    fn create_table_uses_column_metadata() {
        assert_eq!(
            create_table(&users()),
            "CREATE TABLE IF NOT EXISTS \"app\".\"users\" (\"id\" BIGSERIAL PRIMARY KEY, \
             \"name\" VARCHAR(255) NOT NULL, \"is_active\" BOOLEAN NOT NULL DEFAULT FALSE)"
        );
    }
}
