//! Load an API description from JSON and build it into resources.

use crate::adapters::AdapterRegistry;
use crate::api::Api;
use crate::config::options::ResourceMeta;
use crate::config::{resource_name, validate, ApiConfig, FieldConfig, FieldType, ResourceConfig};
use crate::error::ConfigError;
use crate::fields::Field;
use crate::resource::ModelResource;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

pub fn load_from_str(s: &str) -> Result<ApiConfig, ConfigError> {
    serde_json::from_str(s).map_err(|e| ConfigError::Load(e.to_string()))
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<ApiConfig, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    load_from_str(&raw)
}

struct Pending<'a> {
    name: String,
    meta: ResourceMeta,
    config: &'a ResourceConfig,
    /// Resources named by declared relation fields.
    hard: HashSet<String>,
    /// Resources resolving foreign-key columns; without them the column stays an integer.
    soft: HashSet<String>,
}

/// Validate `config` and build every resource and nested route into an [`Api`].
/// Related resources are built before the resources that reference them; a cycle through
/// foreign-key columns is broken by leaving one column unresolved.
pub fn build_api(config: &ApiConfig, registry: &AdapterRegistry) -> Result<Api, ConfigError> {
    validate(config)?;

    let models: HashMap<&str, _> = config.models.iter().map(|m| (m.id.as_str(), m)).collect();
    // First resource exposing a model resolves foreign keys that reference it.
    let mut model_resource: HashMap<&str, String> = HashMap::new();
    let mut pending = Vec::with_capacity(config.resources.len());
    for r in &config.resources {
        let meta = ResourceMeta::from_value(r.meta.clone())?;
        let name = resource_name(&meta, &r.model);
        model_resource.entry(r.model.as_str()).or_insert_with(|| name.clone());
        pending.push((name, meta, r));
    }

    let mut pending: Vec<Pending> = pending
        .into_iter()
        .map(|(name, meta, r)| {
            let mut hard: HashSet<String> = r.fields.values().filter_map(|f| f.related.clone()).collect();
            let mut soft = HashSet::new();
            if let Some(model) = models.get(r.model.as_str()) {
                for col in &model.columns {
                    if r.fields.contains_key(&col.name) {
                        continue;
                    }
                    if let Some(dep) = col.references.as_deref().and_then(|m| model_resource.get(m)) {
                        soft.insert(dep.clone());
                    }
                }
            }
            hard.remove(&name);
            soft.remove(&name);
            Pending {
                name,
                meta,
                config: r,
                hard,
                soft,
            }
        })
        .collect();

    let mut built: HashMap<String, Arc<ModelResource>> = HashMap::new();
    let mut order = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let ready = |deps: &HashSet<String>| deps.iter().all(|d| built.contains_key(d));
        let next = pending
            .iter()
            .position(|p| ready(&p.hard) && ready(&p.soft))
            .or_else(|| pending.iter().position(|p| ready(&p.hard)));
        let Some(idx) = next else {
            let names: Vec<_> = pending.iter().map(|p| p.name.as_str()).collect();
            return Err(ConfigError::Validation(format!(
                "circular resource dependencies: {}",
                names.join(", ")
            )));
        };
        if !ready(&pending[idx].soft) {
            tracing::warn!(
                resource = %pending[idx].name,
                "foreign keys on a dependency cycle are exposed as plain integers"
            );
        }
        let p = pending.remove(idx);
        let model = models.get(p.config.model.as_str()).ok_or_else(|| ConfigError::MissingReference {
            kind: "model",
            id: p.config.model.clone(),
        })?;
        let mut builder = ModelResource::builder(model.to_schema())
            .meta(p.meta)
            .registry(registry);
        for col in &model.columns {
            let related = col
                .references
                .as_deref()
                .and_then(|m| model_resource.get(m))
                .and_then(|name| built.get(name));
            if let (Some(model_id), Some(res)) = (col.references.as_deref(), related) {
                builder = builder.related(model_id, res.clone());
            }
        }
        for (name, fc) in &p.config.fields {
            builder = builder.field(name.clone(), field_from_config(name, fc, &built)?);
        }
        let resource = Arc::new(builder.build()?);
        order.push(p.name.clone());
        built.insert(p.name, resource);
    }

    let mut api = Api::new(config.name.clone());
    // Registration keeps the order resources were declared in.
    for r in &config.resources {
        let meta = ResourceMeta::from_value(r.meta.clone())?;
        let name = resource_name(&meta, &r.model);
        if let Some(res) = built.get(&name) {
            api.register_resource(res.clone())?;
        }
    }
    for n in &config.nested {
        let lookup = |name: &str| {
            built.get(name).cloned().ok_or_else(|| ConfigError::MissingReference {
                kind: "resource",
                id: name.to_string(),
            })
        };
        api.register_nested_resource(lookup(&n.parent)?, lookup(&n.resource)?, n.field.clone())?;
    }
    tracing::info!(api = %config.name, build_order = ?order, "api built");
    Ok(api)
}

fn field_from_config(
    name: &str,
    fc: &FieldConfig,
    built: &HashMap<String, Arc<ModelResource>>,
) -> Result<Field, ConfigError> {
    let attribute = fc.attribute.clone().unwrap_or_else(|| name.to_string());
    let related = || -> Result<Arc<ModelResource>, ConfigError> {
        let id = fc.related.clone().unwrap_or_default();
        built.get(&id).cloned().ok_or(ConfigError::MissingReference { kind: "resource", id })
    };
    let mut field = match fc.kind {
        FieldType::Char => Field::char(attribute),
        FieldType::Text => Field::text(attribute),
        FieldType::Integer => Field::integer(attribute),
        FieldType::Float => Field::float(attribute),
        FieldType::Boolean => Field::boolean(attribute),
        FieldType::Datetime => Field::datetime(attribute),
        FieldType::Date => Field::date(attribute),
        FieldType::Url => Field::url(attribute),
        FieldType::ForeignKey => Field::foreign_key(attribute, related()?),
        FieldType::ToMany => {
            let back = fc.related_attribute.clone().unwrap_or_default();
            let mut f = Field::to_many(attribute, related()?, back);
            if fc.full {
                f = f.full();
            }
            f
        }
    };
    if let Some(format) = &fc.format {
        field = field.with_format(format.clone());
    }
    if let Some(show) = &fc.show {
        field = field.show(show);
    }
    field.required = fc.required;
    field.nullable = fc.nullable;
    field.readonly = fc.readonly;
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryStore;
    use crate::fields::FieldKind;

    const BLOG: &str = r#"{
        "name": "blog",
        "models": [
            {"id": "posts", "engine": "memory", "columns": [
                {"name": "title", "type": "char"},
                {"name": "category", "type": "foreign_key", "references": "categories"}
            ]},
            {"id": "categories", "engine": "memory", "columns": [{"name": "name", "type": "char"}]}
        ],
        "resources": [
            {"model": "posts"},
            {"model": "categories", "fields": {
                "posts": {"type": "to_many", "related": "posts", "related_attribute": "category"}
            }}
        ],
        "nested": [{"parent": "categories", "resource": "posts", "field": "category"}]
    }"#;

    #[test]
    fn column_cycle_leaves_foreign_key_unresolved() {
        // posts -> categories through the column, categories -> posts through the to_many field
        let config = load_from_str(BLOG).unwrap();
        let api = build_api(&config, &AdapterRegistry::new().with_memory(MemoryStore::new())).unwrap();
        let posts = api.resource("posts").unwrap();
        assert!(matches!(posts.fields()["category"].kind, FieldKind::Integer));
        let categories = api.resource("categories").unwrap();
        assert!(matches!(categories.fields()["posts"].kind, FieldKind::ToMany { .. }));
    }

    #[test]
    fn declared_field_cycle_is_rejected() {
        let mut config = load_from_str(BLOG).unwrap();
        let back = serde_json::json!({"type": "foreign_key", "related": "categories"});
        config.resources[0]
            .fields
            .insert("category".into(), serde_json::from_value(back).unwrap());
        let err = build_api(&config, &AdapterRegistry::new().with_memory(MemoryStore::new())).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref m) if m.contains("circular")));
    }

    #[test]
    fn builds_related_resources_before_dependents() {
        let mut config = load_from_str(BLOG).unwrap();
        config.resources[1].fields.clear();
        let api = build_api(&config, &AdapterRegistry::new().with_memory(MemoryStore::new())).unwrap();
        let names: Vec<_> = api.resources().map(|r| r.options().resource_name.clone()).collect();
        assert_eq!(names, vec!["posts", "categories"]);
        let posts = api.resource("posts").unwrap();
        assert!(matches!(posts.fields()["category"].kind, FieldKind::ForeignKey { .. }));
        assert_eq!(api.nested().len(), 1);
    }

    #[test]
    fn unknown_engine_fails_at_build_time() {
        let mut config = load_from_str(BLOG).unwrap();
        config.resources[1].fields.clear();
        config.models[0].engine = "postgres".into();
        let err = build_api(&config, &AdapterRegistry::new().with_memory(MemoryStore::new())).unwrap_err();
        assert!(matches!(err, ConfigError::NoAdapter { ref model, .. } if model == "posts"));
    }

    #[test]
    fn malformed_json_is_a_load_error() {
        assert!(matches!(load_from_str("{"), Err(ConfigError::Load(_))));
    }
}
