use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wing::{build_api, load_from_str, common_routes, AdapterRegistry, MemoryStore};

const CONFIG: &str = r#"{
    "name": "v1",
    "models": [
        {"id": "users", "engine": "memory", "columns": [
            {"name": "name", "type": "char"},
            {"name": "is_active", "type": "boolean", "default": false},
            {"name": "modification_date", "type": "timestamp", "nullable": true}
        ]},
        {"id": "categories", "engine": "memory", "columns": [
            {"name": "title", "type": "char"},
            {"name": "slug", "type": "char"}
        ]},
        {"id": "posts", "engine": "memory", "columns": [
            {"name": "title", "type": "char"},
            {"name": "slug", "type": "char"},
            {"name": "category", "type": "foreign_key", "references": "categories", "nullable": true},
            {"name": "content", "type": "text", "default": ""}
        ]}
    ],
    "resources": [
        {"model": "users", "meta": {"filtering": {"name": ["exact", "startswith"]}}},
        {"model": "categories"},
        {"model": "posts", "meta": {"filtering": {"category": ["exact"]}}}
    ],
    "nested": [
        {"parent": "categories", "resource": "posts", "field": "category"}
    ]
}"#;

fn app() -> Router {
    let config = load_from_str(CONFIG).unwrap();
    let registry = AdapterRegistry::new().with_memory(MemoryStore::new());
    let api = build_api(&config, &registry).unwrap();
    common_routes().merge(api.router())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn seeded() -> Router {
    let app = app();
    for user in [json!({"name": "test1"}), json!({"name": "test2", "is_active": true})] {
        let (status, _) = send(&app, "POST", "/v1/users", Some(user)).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    app
}

#[tokio::test]
async fn list_returns_meta_and_objects_in_order() {
    let app = seeded().await;
    let (status, body) = send(&app, "GET", "/v1/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"], json!({"offset": 0, "limit": 20, "total_count": 2}));
    assert_eq!(body["objects"][0]["name"], "test1");
    assert_eq!(body["objects"][1]["name"], "test2");
}

#[tokio::test]
async fn details_show_defaults() {
    let app = seeded().await;
    let (status, body) = send(&app, "GET", "/v1/users/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "test1");
    assert_eq!(body["is_active"], false);
}

#[tokio::test]
async fn create_returns_new_key() {
    let app = seeded().await;
    let (status, body) = send(
        &app,
        "POST",
        "/v1/users/",
        Some(json!({"name": "test3", "is_active": true})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"id": 3}));
}

#[tokio::test]
async fn update_details_replaces_fields() {
    let app = seeded().await;
    let (status, body) = send(
        &app,
        "PUT",
        "/v1/users/2",
        Some(json!({"name": "test2-updated", "is_active": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 2);
    assert_eq!(body["name"], "test2-updated");
    assert_eq!(body["is_active"], true);
}

#[tokio::test]
async fn patch_keeps_absent_fields() {
    let app = seeded().await;
    let (status, body) = send(&app, "PATCH", "/v1/users/2", Some(json!({"is_active": false}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "test2");
    assert_eq!(body["is_active"], false);
}

#[tokio::test]
async fn batch_update_saves_each_row() {
    let app = seeded().await;
    let (status, body) = send(
        &app,
        "PUT",
        "/v1/users/",
        Some(json!([
            {"id": 2, "name": "test2-updated", "is_active": true},
            {"id": 1, "name": "test1-updated", "is_active": true}
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"objects": [{"id": 2}, {"id": 1}]}));

    let (_, body) = send(&app, "GET", "/v1/users/1", None).await;
    assert_eq!(body["name"], "test1-updated");
}

#[tokio::test]
async fn batch_update_rejects_items_without_key() {
    let app = seeded().await;
    let (status, body) = send(&app, "PUT", "/v1/users/", Some(json!([{"name": "x"}]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["title"], "No PK");

    let (status, body) = send(&app, "PUT", "/v1/users/", Some(json!([{"id": 99, "name": "x"}]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["title"], "Validation error");
}

#[tokio::test]
async fn delete_then_missing() {
    let app = seeded().await;
    let (status, body) = send(&app, "DELETE", "/v1/users/2", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, "GET", "/v1/users/2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", "/v1/users/2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn batch_delete_empties_collection() {
    let app = seeded().await;
    let (status, _) = send(&app, "DELETE", "/v1/users/", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = send(&app, "GET", "/v1/users/", None).await;
    assert_eq!(body["meta"]["total_count"], 0);
}

#[tokio::test]
async fn wrong_method_reports_allowed_methods() {
    let app = seeded().await;
    let req = Request::builder()
        .method("POST")
        .uri("/v1/users/2")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    let allow = resp.headers().get(header::ALLOW).unwrap().to_str().unwrap();
    assert!(allow.contains("GET"));
    assert!(allow.contains("PATCH"));
    assert!(!allow.contains("POST"));

    let req = Request::builder()
        .method("PATCH")
        .uri("/v1/users/")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    let allow = resp.headers().get(header::ALLOW).unwrap().to_str().unwrap();
    assert!(allow.contains("POST"));
    assert!(!allow.contains("PATCH"));
}

#[tokio::test]
async fn filtering_by_declared_operators() {
    let app = seeded().await;
    let (_, body) = send(&app, "GET", "/v1/users/?name=test1", None).await;
    assert_eq!(body["meta"]["total_count"], 1);
    assert_eq!(body["objects"][0]["name"], "test1");

    let (_, body) = send(&app, "GET", "/v1/users/?name__startswith=test1", None).await;
    assert_eq!(body["meta"]["total_count"], 1);
    let (_, body) = send(&app, "GET", "/v1/users/?name__startswith=est1", None).await;
    assert_eq!(body["meta"]["total_count"], 0);

    // not declared, ignored
    let (status, body) = send(&app, "GET", "/v1/users/?name__endswith=test1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total_count"], 2);
}

#[tokio::test]
async fn paging_parameters() {
    let app = seeded().await;
    let (_, body) = send(&app, "GET", "/v1/users/?limit=1&page=2", None).await;
    assert_eq!(body["meta"], json!({"offset": 1, "limit": 1, "total_count": 2}));
    assert_eq!(body["objects"][0]["name"], "test2");

    let (status, body) = send(&app, "GET", "/v1/users/?page=18446744073709551615", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["offset"], i64::MAX);
    assert_eq!(body["meta"]["total_count"], 2);
    assert_eq!(body["objects"], json!([]));

    let (status, body) = send(&app, "GET", "/v1/users/?page=abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["title"], "Validation error");
}

#[tokio::test]
async fn missing_required_field_is_rejected() {
    let app = seeded().await;
    let (status, body) = send(&app, "POST", "/v1/users/", Some(json!({"is_active": true}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["title"], "Validation error");
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let app = seeded().await;
    let req = Request::builder()
        .method("POST")
        .uri("/v1/users/")
        .body(Body::from("Invalid JSON"))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["title"], "Invalid format");
}

#[tokio::test]
async fn nested_routes_follow_parent_key() {
    let app = app();
    for title in ["news", "sport"] {
        let (status, _) = send(
            &app,
            "POST",
            "/v1/categories/",
            Some(json!({"title": title, "slug": title})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(
        &app,
        "POST",
        "/v1/categories/1/posts/",
        Some(json!({"title": "first", "slug": "first", "category": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"id": 1}));
    let (status, _) = send(
        &app,
        "POST",
        "/v1/posts/",
        Some(json!({"title": "other", "slug": "other", "category": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send(&app, "GET", "/v1/posts/1", None).await;
    assert_eq!(body["category"], 1);

    let (_, body) = send(&app, "GET", "/v1/categories/1/posts", None).await;
    assert_eq!(body["meta"]["total_count"], 1);
    assert_eq!(body["objects"][0]["title"], "first");

    let (status, _) = send(&app, "GET", "/v1/categories/1/posts/2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = send(&app, "GET", "/v1/categories/2/posts/2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "other");

    let (status, _) = send(&app, "GET", "/v1/categories/9/posts", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_foreign_key_is_not_found() {
    let app = app();
    let (status, _) = send(
        &app,
        "POST",
        "/v1/posts/",
        Some(json!({"title": "t", "slug": "t", "category": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_route() {
    let app = app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
