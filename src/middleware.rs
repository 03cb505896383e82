//! Conditional GET over a shared cache.
//!
//! Any non-GET request stamps `last_modified`; a GET whose `If-Modified-Since` is not older
//! than the stamp is answered with 304 without reaching the handler.

use crate::cache::SharedCache;
use axum::{
    extract::{Request, State},
    http::{header, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde_json::Value;

pub const LAST_MODIFIED_KEY: &str = "last_modified";

fn if_modified_since(req: &Request) -> Option<i64> {
    let raw = req.headers().get(header::IF_MODIFIED_SINCE)?.to_str().ok()?;
    DateTime::parse_from_rfc2822(raw.trim()).ok().map(|d| d.timestamp())
}

pub async fn http_cache(State(cache): State<SharedCache>, req: Request, next: Next) -> Response {
    if req.method() != Method::GET {
        cache.set(LAST_MODIFIED_KEY, Value::from(Utc::now().timestamp()), None);
        return next.run(req).await;
    }
    let stamp = cache.get(LAST_MODIFIED_KEY).and_then(|v| v.as_i64());
    if let (Some(stamp), Some(since)) = (stamp, if_modified_since(&req)) {
        if since >= stamp {
            tracing::debug!(path = %req.uri().path(), "not modified");
            return StatusCode::NOT_MODIFIED.into_response();
        }
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LocMemCache;
    use axum::{body::Body, middleware::from_fn_with_state, routing::get, Router};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(cache: SharedCache) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }).post(|| async { "done" }))
            .layer(from_fn_with_state(cache, http_cache))
    }

    fn get_since(since: &str) -> Request {
        Request::builder()
            .uri("/")
            .header(header::IF_MODIFIED_SINCE, since)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn unstamped_cache_passes_through() {
        let cache: SharedCache = Arc::new(LocMemCache::new());
        let resp = app(cache).oneshot(get_since("Sun, 06 Nov 1994 08:49:37 GMT")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn write_stamps_and_later_get_is_not_modified() {
        let cache: SharedCache = Arc::new(LocMemCache::new());
        let post = Request::builder().method("POST").uri("/").body(Body::empty()).unwrap();
        let resp = app(cache.clone()).oneshot(post).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(cache.get(LAST_MODIFIED_KEY).is_some());

        let later = (Utc::now() + chrono::Duration::seconds(5)).to_rfc2822();
        let resp = app(cache.clone()).oneshot(get_since(&later)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);

        let resp = app(cache).oneshot(get_since("Sun, 06 Nov 1994 08:49:37 GMT")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
