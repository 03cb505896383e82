//! Collection and item handlers. One handler per path shape, dispatching on the HTTP method.

use crate::error::AppError;
use crate::fields::Sender;
use crate::filter::parse_query_filters;
use crate::resource::{ModelResource, Payload};
use crate::response::{created, list_ok, object_ok, objects_ok, Object};
use crate::state::ResourceState;
use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use std::collections::HashMap;

/// Key segment right after a top-level resource: an object key, or the parent key on
/// nested routes. Sibling routes must share parameter names at the same depth.
pub const PK_PARAM: &str = "pk";
/// Object key on nested item routes.
pub const NESTED_PK_PARAM: &str = "nested_pk";

type PathParams = Option<Path<HashMap<String, String>>>;

/// Verbs each path shape dispatches on.
const COLLECTION_METHODS: &[Method] = &[Method::GET, Method::POST, Method::PUT, Method::DELETE];
const ITEM_METHODS: &[Method] = &[Method::GET, Method::PUT, Method::PATCH, Method::DELETE];

fn check_allowed(resource: &ModelResource, method: &Method, handled: &[Method]) -> Result<(), AppError> {
    if handled.contains(method) && resource.options().allows(method) {
        Ok(())
    } else {
        Err(method_not_allowed(resource, handled))
    }
}

/// 405 advertising the verbs that are both configured and served on this path.
fn method_not_allowed(resource: &ModelResource, handled: &[Method]) -> AppError {
    AppError::MethodNotAllowed {
        allowed: resource
            .options()
            .allowed_methods
            .iter()
            .filter(|m| handled.contains(m))
            .map(|m| m.as_str().to_string())
            .collect(),
    }
}

fn query_pairs(raw: Option<&str>) -> Vec<(String, String)> {
    raw.map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

fn param_u64(pairs: &[(String, String)], name: &str) -> Result<Option<u64>, AppError> {
    match pairs.iter().find(|(k, _)| k == name) {
        None => Ok(None),
        Some((_, v)) => v.trim().parse().map(Some).map_err(|_| AppError::InvalidValue {
            field: name.to_string(),
            message: format!("expected a positive integer, got '{}'", v),
        }),
    }
}

fn parse_json(body: &Bytes) -> Result<Value, AppError> {
    serde_json::from_slice(body).map_err(|e| AppError::InvalidFormat(e.to_string()))
}

fn as_payload(value: Value) -> Result<Payload, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::InvalidFormat("expected a JSON object".into())),
    }
}

/// Raw path value of a key in a JSON body.
fn key_segment(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Path-derived lookups: the parent relation on nested routes, then the object key.
fn kwargs(state: &ResourceState, params: &PathParams) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let Some(Path(params)) = params else { return out };
    let item_param = match &state.nested_field {
        Some(field) => {
            if let Some(v) = params.get(PK_PARAM) {
                out.push((field.clone(), v.clone()));
            }
            NESTED_PK_PARAM
        }
        None => PK_PARAM,
    };
    if let Some(v) = params.get(item_param) {
        out.push((state.resource.options().primary_key.clone(), v.clone()));
    }
    out
}

fn pk_value(resource: &ModelResource, obj: &crate::value::Record) -> Value {
    obj.value(&resource.pk_field().attribute).to_json()
}

/// `/{resource}` and `/{parent}/{parent_pk}/{resource}`.
pub async fn collection(
    State(state): State<ResourceState>,
    method: Method,
    params: PathParams,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Response, AppError> {
    let resource = state.resource.as_ref();
    check_allowed(resource, &method, COLLECTION_METHODS)?;
    let kwargs = kwargs(&state, &params);
    let pairs = query_pairs(query.as_deref());

    match method {
        Method::GET => {
            let raw = parse_query_filters(
                pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                &resource.options().filtering,
            );
            let filters = resource.filters_from_raw(raw)?;
            let page = param_u64(&pairs, "page")?;
            let limit = param_u64(&pairs, "limit")?;
            let query = resource.get_object_list(filters, &kwargs).await?;
            let page = resource.paginate(query, page, limit).await?;
            Ok(list_ok(page).into_response())
        }
        Method::POST => {
            // Parent must exist before the payload is looked at.
            resource.filters_from_kwargs(&kwargs).await?;
            let mut data = as_payload(parse_json(&body)?)?;
            for (field, v) in &kwargs {
                data.insert(field.clone(), Value::String(v.clone()));
            }
            let mut obj = resource.create_object();
            resource.hydrate(&mut obj, &data).await?;
            resource.save_object(&mut obj).await?;
            tracing::debug!(resource = %resource.options().resource_name, "object created");
            Ok(created(&resource.options().primary_key, pk_value(resource, &obj)).into_response())
        }
        Method::PUT => {
            let items = match parse_json(&body)? {
                Value::Array(items) => items,
                _ => return Err(AppError::InvalidFormat("expected a JSON array".into())),
            };
            let pk_name = resource.options().primary_key.clone();
            let mut results = Vec::with_capacity(items.len());
            // Rows are saved one at a time; a failure leaves earlier rows saved.
            for item in items {
                let data = as_payload(item)?;
                let pk = data.get(&pk_name).and_then(key_segment).ok_or(AppError::NoPrimaryKey)?;
                let mut lookup = kwargs.clone();
                lookup.push((pk_name.clone(), pk.clone()));
                let mut obj = match resource.get_object(&lookup).await {
                    Ok(obj) => obj,
                    Err(AppError::DoesNotExist) => {
                        return Err(AppError::InvalidValue {
                            field: pk_name,
                            message: format!("object '{}' does not exist", pk),
                        })
                    }
                    Err(e) => return Err(e),
                };
                resource.hydrate(&mut obj, &data).await?;
                resource.save_object(&mut obj).await?;
                let mut row = Object::new();
                row.insert(pk_name.clone(), pk_value(resource, &obj));
                results.push(row);
            }
            Ok(objects_ok(results).into_response())
        }
        Method::DELETE => {
            let raw = parse_query_filters(
                pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                &resource.options().filtering,
            );
            let filters = resource.filters_from_raw(raw)?;
            let query = match resource.get_object_list(filters, &kwargs).await {
                Ok(q) => q,
                Err(AppError::DoesNotExist) => return Ok(StatusCode::NO_CONTENT.into_response()),
                Err(e) => return Err(e),
            };
            let affected = query.delete().await?;
            tracing::debug!(resource = %resource.options().resource_name, affected, "bulk delete");
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        _ => Err(method_not_allowed(resource, COLLECTION_METHODS)),
    }
}

/// `/{resource}/{pk}` and `/{parent}/{parent_pk}/{resource}/{pk}`.
pub async fn item(
    State(state): State<ResourceState>,
    method: Method,
    params: PathParams,
    body: Bytes,
) -> Result<Response, AppError> {
    let resource = state.resource.as_ref();
    check_allowed(resource, &method, ITEM_METHODS)?;
    let kwargs = kwargs(&state, &params);

    match method {
        Method::GET => {
            let obj = resource.get_object(&kwargs).await?;
            let out = resource.dehydrate(&obj, Some(Sender::Details)).await?;
            Ok(object_ok(out).into_response())
        }
        Method::PUT | Method::PATCH => {
            let mut obj = resource.get_object(&kwargs).await?;
            let data = as_payload(parse_json(&body)?)?;
            if method == Method::PUT {
                resource.hydrate(&mut obj, &data).await?;
            } else {
                resource.hydrate_partial(&mut obj, &data).await?;
            }
            resource.save_object(&mut obj).await?;
            let out = resource.dehydrate(&obj, None).await?;
            Ok(object_ok(out).into_response())
        }
        Method::DELETE => match resource.delete_object(&kwargs).await? {
            0 => Err(AppError::DoesNotExist),
            _ => Ok(StatusCode::NO_CONTENT.into_response()),
        },
        _ => Err(method_not_allowed(resource, ITEM_METHODS)),
    }
}
