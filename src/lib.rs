//! Wing: declarative REST resources over axum and a pluggable persistence adapter.

pub mod adapters;
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod fields;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod model;
pub mod pagination;
pub mod query;
pub mod resource;
pub mod response;
pub mod routes;
pub mod sql;
pub mod state;
pub mod value;

pub use adapters::{Adapter, AdapterRegistry, MemoryAdapter, MemoryStore, PgAdapter};
pub use api::Api;
pub use cache::{Cache, DummyCache, LocMemCache, SharedCache};
pub use config::{build_api, load_from_path, load_from_str, ApiConfig, ResourceMeta, ResourceOptions};
pub use error::{AppError, ConfigError, FieldError};
pub use fields::{Field, FieldKind, Sender};
pub use filter::{Filter, Operator};
pub use middleware::http_cache;
pub use model::{ColumnDef, ColumnKind, ModelSchema};
pub use pagination::Paginator;
pub use query::Query;
pub use resource::{ModelResource, Resource};
pub use routes::{api_routes, common_routes};
pub use value::{AttrValue, Record};
