//! Per-route handler state: the resource a route serves and, for nested routes, the field
//! that carries the parent key.

use crate::resource::ModelResource;
use std::sync::Arc;

#[derive(Clone)]
pub struct ResourceState {
    pub resource: Arc<ModelResource>,
    pub nested_field: Option<String>,
}

impl ResourceState {
    pub fn new(resource: Arc<ModelResource>) -> Self {
        ResourceState {
            resource,
            nested_field: None,
        }
    }

    pub fn nested(resource: Arc<ModelResource>, field: impl Into<String>) -> Self {
        ResourceState {
            resource,
            nested_field: Some(field.into()),
        }
    }
}
