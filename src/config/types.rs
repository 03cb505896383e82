//! API description types (JSON/serde).

use crate::fields::Sender;
use crate::model::{ColumnDef, ModelSchema, ENGINE_POSTGRES};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Full API description: models, the resources exposing them and nested routes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    pub name: String,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
    #[serde(default)]
    pub nested: Vec<NestedConfig>,
}

fn default_engine() -> String {
    ENGINE_POSTGRES.to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    /// Defaults to the model id. May be schema-qualified (`app.users`).
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default = "default_engine")]
    pub engine: String,
    /// Renames the implicit auto key unless a column of that name is declared.
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnDef>,
}

impl ModelConfig {
    pub fn to_schema(&self) -> ModelSchema {
        let mut schema = ModelSchema::new(self.id.clone(), self.engine.clone());
        if let Some(table) = &self.table {
            schema = schema.table(table.clone());
        }
        if let Some(pk) = &self.primary_key {
            schema = schema.primary_key(pk.clone());
        }
        self.columns
            .iter()
            .cloned()
            .fold(schema, |schema, col| schema.column(col))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Model id this resource exposes.
    pub model: String,
    /// Free-form options; see `ResourceMeta`.
    #[serde(default)]
    pub meta: Value,
    /// Declared fields; these replace fields derived from the model.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldConfig>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Char,
    Text,
    Integer,
    Float,
    Boolean,
    Datetime,
    Date,
    Url,
    ForeignKey,
    ToMany,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldConfig {
    #[serde(rename = "type")]
    pub kind: FieldType,
    /// Record attribute; defaults to the field name.
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub show: Option<Vec<Sender>>,
    /// Parsing pattern for datetime/date fields.
    #[serde(default)]
    pub format: Option<String>,
    /// Related resource name (foreign_key, to_many).
    #[serde(default)]
    pub related: Option<String>,
    /// Attribute on related records pointing back here (to_many).
    #[serde(default)]
    pub related_attribute: Option<String>,
    #[serde(default)]
    pub full: bool,
}

/// `resource` exposed under `/{parent}/{parent_pk}/{resource}`, filtered by `field`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NestedConfig {
    pub parent: String,
    pub resource: String,
    pub field: String,
}
