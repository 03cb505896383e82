//! HTTP handlers for resource collections and items.

pub mod resource;
pub use resource::*;
