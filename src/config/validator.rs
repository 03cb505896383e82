//! Config validation: identifier syntax, referential integrity and API consistency.

use crate::config::options::ResourceMeta;
use crate::config::{ApiConfig, FieldType};
use crate::error::ConfigError;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Names, columns and fields end up in SQL identifiers and URL segments.
const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

struct Identifiers(Regex);

impl Identifiers {
    fn new() -> Result<Self, ConfigError> {
        Regex::new(IDENTIFIER_PATTERN)
            .map(Identifiers)
            .map_err(|e| ConfigError::Validation(format!("identifier pattern: {}", e)))
    }

    fn check(&self, s: &str) -> Result<(), ConfigError> {
        if self.0.is_match(s) {
            Ok(())
        } else {
            Err(ConfigError::InvalidIdentifier(s.to_string()))
        }
    }
}

/// Resource name the config will produce: `meta.resource_name`, else the model id.
pub fn resource_name(meta: &ResourceMeta, model: &str) -> String {
    meta.resource_name.clone().unwrap_or_else(|| model.to_string())
}

pub fn validate(config: &ApiConfig) -> Result<(), ConfigError> {
    let ids = Identifiers::new()?;
    ids.check(&config.name)?;

    let mut models = HashMap::new();
    for m in &config.models {
        ids.check(&m.id)?;
        if let Some(table) = &m.table {
            for part in table.split('.') {
                ids.check(part)?;
            }
        }
        if m.engine.trim().is_empty() {
            return Err(ConfigError::Validation(format!("model '{}' has no engine", m.id)));
        }
        let mut columns = HashSet::new();
        for c in &m.columns {
            ids.check(&c.name)?;
            if !columns.insert(c.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate column '{}' on model '{}'",
                    c.name, m.id
                )));
            }
        }
        if models.insert(m.id.as_str(), m).is_some() {
            return Err(ConfigError::Validation(format!("duplicate model id: {}", m.id)));
        }
    }

    for m in &config.models {
        for c in &m.columns {
            if let Some(r) = &c.references {
                if !models.contains_key(r.as_str()) {
                    return Err(ConfigError::MissingReference {
                        kind: "model",
                        id: r.clone(),
                    });
                }
            }
        }
    }

    let mut resources = HashMap::new();
    for r in &config.resources {
        let model = models.get(r.model.as_str()).ok_or_else(|| ConfigError::MissingReference {
            kind: "model",
            id: r.model.clone(),
        })?;
        let meta = ResourceMeta::from_value(r.meta.clone())?;
        let name = resource_name(&meta, &r.model);
        ids.check(&name)?;
        if resources.insert(name.clone(), (*model, r)).is_some() {
            return Err(ConfigError::DuplicateResource(name));
        }
    }

    for r in &config.resources {
        for (name, f) in &r.fields {
            ids.check(name)?;
            if matches!(f.kind, FieldType::ForeignKey | FieldType::ToMany) {
                let related = f.related.as_ref().ok_or_else(|| {
                    ConfigError::Validation(format!("field '{}' needs a related resource", name))
                })?;
                if !resources.contains_key(related) {
                    return Err(ConfigError::MissingReference {
                        kind: "resource",
                        id: related.clone(),
                    });
                }
            }
            if f.kind == FieldType::ToMany && f.related_attribute.is_none() {
                return Err(ConfigError::Validation(format!(
                    "to_many field '{}' needs related_attribute",
                    name
                )));
            }
        }
    }

    for n in &config.nested {
        if !resources.contains_key(&n.parent) {
            return Err(ConfigError::MissingReference {
                kind: "resource",
                id: n.parent.clone(),
            });
        }
        let (model, res) = resources.get(&n.resource).ok_or_else(|| ConfigError::MissingReference {
            kind: "resource",
            id: n.resource.clone(),
        })?;
        let known = res.fields.contains_key(&n.field) || model.columns.iter().any(|c| c.name == n.field);
        if !known {
            return Err(ConfigError::UnknownField {
                resource: n.resource.clone(),
                field: n.field.clone(),
            });
        }
    }

    Ok(())
}
