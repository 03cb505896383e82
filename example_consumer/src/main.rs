//! Example consumer: a separate Rust project that builds resources in code rather than from a
//! JSON description.
//!
//! Run from repo root: `cargo run -p example-consumer`

use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use wing::{
    common_routes, AdapterRegistry, Api, ColumnDef, ColumnKind, Field, MemoryStore, ModelResource, ModelSchema,
    ResourceMeta,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wing=info")),
        )
        .init();

    let registry = AdapterRegistry::new().with_memory(MemoryStore::new());

    let authors = ModelSchema::new("authors", "memory").column(ColumnDef::new("name", ColumnKind::Char));
    let authors = Arc::new(ModelResource::builder(authors).registry(&registry).build()?);

    let books = ModelSchema::new("books", "memory")
        .column(ColumnDef::new("title", ColumnKind::Char))
        .column(ColumnDef::new("published", ColumnKind::Date).nullable())
        .column(ColumnDef::new("author", ColumnKind::ForeignKey).references("authors"));
    let books = Arc::new(
        ModelResource::builder(books)
            .meta(ResourceMeta::from_value(json!({
                "filtering": {"title": ["contains"], "author": ["exact"]},
                "ordering": ["-published"]
            }))?)
            .field("author", Field::foreign_key("author", authors.clone()).required())
            .registry(&registry)
            .build()?,
    );

    let mut api = Api::new("v1");
    api.register_resource(authors.clone())?;
    api.register_resource(books.clone())?;
    api.register_nested_resource(authors, books, "author")?;

    let app = common_routes().merge(api.router());
    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    let port = listener.local_addr()?.port();
    tracing::info!("Example consumer listening on http://127.0.0.1:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}
