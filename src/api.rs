//! Named registry of resources and nested resources, mapped onto an axum router.

use crate::error::ConfigError;
use crate::resource::ModelResource;
use crate::routes::api_routes;
use axum::Router;
use std::sync::Arc;

/// `resource` exposed below `parent`'s detail path, filtered on `field`.
#[derive(Clone, Debug)]
pub struct NestedResource {
    pub parent: Arc<ModelResource>,
    pub resource: Arc<ModelResource>,
    pub field: String,
}

#[derive(Debug)]
pub struct Api {
    name: String,
    resources: Vec<Arc<ModelResource>>,
    nested: Vec<NestedResource>,
}

impl Api {
    pub fn new(name: impl Into<String>) -> Self {
        Api {
            name: name.into(),
            resources: Vec::new(),
            nested: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register under the resource's name. Names are unique within an API.
    pub fn register_resource(&mut self, resource: Arc<ModelResource>) -> Result<(), ConfigError> {
        let name = &resource.options().resource_name;
        if self.resource(name).is_some() {
            return Err(ConfigError::DuplicateResource(name.clone()));
        }
        tracing::info!(api = %self.name, resource = %name, "resource registered");
        self.resources.push(resource);
        Ok(())
    }

    /// Expose `resource` under `/{parent}/{parent_pk}/{resource}`; `field` names the resource
    /// field holding the parent key.
    pub fn register_nested_resource(
        &mut self,
        parent: Arc<ModelResource>,
        resource: Arc<ModelResource>,
        field: impl Into<String>,
    ) -> Result<(), ConfigError> {
        let field = field.into();
        if resource.field(&field).is_none() {
            return Err(ConfigError::UnknownField {
                resource: resource.options().resource_name.clone(),
                field,
            });
        }
        tracing::info!(
            api = %self.name,
            parent = %parent.options().resource_name,
            resource = %resource.options().resource_name,
            field = %field,
            "nested resource registered"
        );
        self.nested.push(NestedResource { parent, resource, field });
        Ok(())
    }

    pub fn resource(&self, name: &str) -> Option<&Arc<ModelResource>> {
        self.resources.iter().find(|r| r.options().resource_name == name)
    }

    pub fn resources(&self) -> impl Iterator<Item = &Arc<ModelResource>> {
        self.resources.iter()
    }

    pub fn nested(&self) -> &[NestedResource] {
        &self.nested
    }

    /// Routes for every registered resource under `/{name}`.
    pub fn router(&self) -> Router {
        api_routes(self)
    }
}
