//! Resource routes built from an [`Api`]: collection and item paths per resource, with and
//! without a trailing slash, plus nested paths below a parent's key.

use crate::api::Api;
use crate::handlers::resource::{collection, item, NESTED_PK_PARAM, PK_PARAM};
use crate::state::ResourceState;
use axum::{routing::any, Router};

fn resource_routes(base: &str, item_param: &str, state: ResourceState) -> Router {
    let item_path = format!("{}/:{}", base, item_param);
    Router::new()
        .route(base, any(collection))
        .route(&format!("{}/", base), any(collection))
        .route(&item_path, any(item))
        .route(&format!("{}/", item_path), any(item))
        .with_state(state)
}

pub fn api_routes(api: &Api) -> Router {
    let mut router = Router::new();
    for res in api.resources() {
        let base = format!("/{}/{}", api.name(), res.options().resource_name);
        tracing::debug!(path = %base, "mounting resource");
        router = router.merge(resource_routes(&base, PK_PARAM, ResourceState::new(res.clone())));
    }
    for nested in api.nested() {
        let base = format!(
            "/{}/{}/:{}/{}",
            api.name(),
            nested.parent.options().resource_name,
            PK_PARAM,
            nested.resource.options().resource_name
        );
        tracing::debug!(path = %base, "mounting nested resource");
        let state = ResourceState::nested(nested.resource.clone(), nested.field.clone());
        router = router.merge(resource_routes(&base, NESTED_PK_PARAM, state));
    }
    router
}
