//! Example server: loads an API description from CONFIG_PATH, binds every model to PostgreSQL
//! (when DATABASE_URL is set) or the in-process store, and serves it with conditional GET.

use axum::{middleware::from_fn_with_state, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tracing_subscriber::EnvFilter;
use wing::{build_api, common_routes, http_cache, load_from_path, AdapterRegistry, LocMemCache, MemoryStore, SharedCache};

const MAX_BODY_BYTES: usize = 1024 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("wing=info".parse()?))
        .init();

    let pool = match std::env::var("DATABASE_URL") {
        Ok(url) => Some(
            sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(&url)
                .await?,
        ),
        Err(_) => {
            tracing::warn!("DATABASE_URL not set; postgres models are unavailable");
            None
        }
    };
    let registry = AdapterRegistry::standard(pool, MemoryStore::new());

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "demos/blog.json".into());
    let config = load_from_path(&config_path)?;
    let api = build_api(&config, &registry)?;
    if std::env::var("CREATE_TABLES").map(|v| v == "1").unwrap_or(false) {
        for resource in api.resources() {
            resource.adapter().ensure_storage().await?;
        }
    }

    let cache: SharedCache = Arc::new(LocMemCache::new());
    let app = Router::new()
        .merge(common_routes())
        .merge(api.router())
        .layer(from_fn_with_state(cache, http_cache))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES));

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
