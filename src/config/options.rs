//! Resource options: user meta merged with defaults, computed once per resource.

use crate::error::ConfigError;
use crate::filter::FilteringRules;
use axum::http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

pub const DEFAULT_LIMIT: u32 = 20;
pub const DEFAULT_MAX_LIMIT: u32 = 1000;
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Configuration keys starting with this prefix are internal and never copied.
pub const RESERVED_PREFIX: char = '_';

/// User-supplied resource configuration. Every key is optional; unknown keys are ignored.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResourceMeta {
    #[serde(default)]
    pub resource_name: Option<String>,
    #[serde(default)]
    pub allowed_methods: Option<Vec<String>>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub max_limit: Option<u32>,
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub filtering: Option<FilteringRules>,
    /// Field names; a leading `-` sorts descending.
    #[serde(default)]
    pub ordering: Option<Vec<String>>,
    #[serde(default)]
    pub excludes: Option<Vec<String>>,
}

impl ResourceMeta {
    /// Build from a free-form JSON object, skipping reserved keys.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let value = match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .filter(|(k, _)| !k.starts_with(RESERVED_PREFIX))
                    .collect(),
            ),
            Value::Null => return Ok(Self::default()),
            _ => return Err(ConfigError::Validation("resource meta must be a JSON object".into())),
        };
        serde_json::from_value(value).map_err(|e| ConfigError::Validation(e.to_string()))
    }
}

#[derive(Clone, Debug)]
pub struct ResourceOptions {
    pub resource_name: String,
    pub allowed_methods: Vec<Method>,
    pub limit: u32,
    pub max_limit: u32,
    pub primary_key: String,
    pub filtering: FilteringRules,
    pub ordering: Vec<String>,
    pub excludes: HashSet<String>,
}

pub fn default_allowed_methods() -> Vec<Method> {
    vec![Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::PATCH]
}

impl ResourceOptions {
    /// Finalize options; `fallback_name` is used when the meta names no resource.
    pub fn new(meta: Option<ResourceMeta>, fallback_name: &str) -> Self {
        let meta = meta.unwrap_or_default();
        let allowed_methods = match meta.allowed_methods {
            Some(methods) => methods
                .iter()
                .filter_map(|m| Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes()).ok())
                .collect(),
            None => default_allowed_methods(),
        };
        ResourceOptions {
            resource_name: meta.resource_name.unwrap_or_else(|| fallback_name.to_string()),
            allowed_methods,
            limit: meta.limit.unwrap_or(DEFAULT_LIMIT).max(1),
            max_limit: meta.max_limit.unwrap_or(DEFAULT_MAX_LIMIT).max(1),
            primary_key: meta.primary_key.unwrap_or_else(|| DEFAULT_PRIMARY_KEY.to_string()),
            filtering: meta.filtering.unwrap_or_default(),
            ordering: meta.ordering.unwrap_or_default(),
            excludes: meta.excludes.unwrap_or_default().into_iter().collect(),
        }
    }

    pub fn allows(&self, method: &Method) -> bool {
        self.allowed_methods.contains(method)
    }
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self::new(None, "")
    }
}
