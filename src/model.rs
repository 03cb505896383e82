//! Persistence model metadata: the table a model resource is bound to and its typed columns.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ENGINE_POSTGRES: &str = "postgres";
pub const ENGINE_MEMORY: &str = "memory";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Auto-incrementing integer key assigned by the engine on insert.
    AutoKey,
    Integer,
    Float,
    Char,
    Text,
    Boolean,
    Timestamp,
    Date,
    Url,
    /// Relation to another model; the column stores the related primary key.
    ForeignKey,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ColumnKind,
    #[serde(default)]
    pub nullable: bool,
    /// Literal default applied to new objects.
    #[serde(default)]
    pub default: Option<Value>,
    /// Related model name for foreign keys.
    #[serde(default)]
    pub references: Option<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        ColumnDef {
            name: name.into(),
            kind,
            nullable: false,
            default: None,
            references: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn references(mut self, model: impl Into<String>) -> Self {
        self.references = Some(model.into());
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.kind == ColumnKind::AutoKey
    }
}

/// The persistence class a model resource is bound to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
    pub name: String,
    pub table: String,
    pub engine: String,
    pub primary_key: String,
    pub columns: Vec<ColumnDef>,
}

impl ModelSchema {
    /// New model with an implicit auto key column `id` and table named after the model.
    pub fn new(name: impl Into<String>, engine: impl Into<String>) -> Self {
        let name = name.into();
        ModelSchema {
            table: name.clone(),
            name,
            engine: engine.into(),
            primary_key: "id".into(),
            columns: vec![ColumnDef::new("id", ColumnKind::AutoKey)],
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Rename the primary key column.
    pub fn primary_key(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if let Some(col) = self.columns.iter_mut().find(|c| c.name == self.primary_key) {
            col.name = name.clone();
        }
        self.primary_key = name;
        self
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.retain(|c| c.name != column.name);
        self.columns.push(column);
        self
    }

    pub fn column_by_name(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn pk_column(&self) -> Option<&ColumnDef> {
        self.column_by_name(&self.primary_key)
    }
}
