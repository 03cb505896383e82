pub mod loader;
pub mod options;
pub mod types;
pub mod validator;

pub use loader::*;
pub use options::{ResourceMeta, ResourceOptions};
pub use types::*;
pub use validator::*;
