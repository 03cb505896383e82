//! Response envelope helpers.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::{Map, Value};

/// Dehydrated object as sent over the wire.
pub type Object = Map<String, Value>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub limit: u64,
    pub offset: u64,
    pub total_count: u64,
}

/// List envelope: `{meta: {limit, offset, total_count}, objects: [...]}`.
#[derive(Clone, Debug, Serialize)]
pub struct ListPage {
    pub meta: PageMeta,
    pub objects: Vec<Object>,
}

#[derive(Serialize)]
pub struct Objects {
    pub objects: Vec<Object>,
}

pub fn list_ok(page: ListPage) -> (StatusCode, Json<ListPage>) {
    (StatusCode::OK, Json(page))
}

/// `201 {<primary_key>: <id>}`.
pub fn created(primary_key: &str, id: Value) -> (StatusCode, Json<Object>) {
    let mut body = Map::new();
    body.insert(primary_key.to_string(), id);
    (StatusCode::CREATED, Json(body))
}

pub fn object_ok(obj: Object) -> (StatusCode, Json<Object>) {
    (StatusCode::OK, Json(obj))
}

pub fn objects_ok(objects: Vec<Object>) -> (StatusCode, Json<Objects>) {
    (StatusCode::OK, Json(Objects { objects }))
}
