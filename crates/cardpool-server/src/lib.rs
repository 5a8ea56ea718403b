//! HTTP gateway in front of the remote card pool.
//!
//! - [`config`] - Layered server configuration
//! - [`api_key`] - `key` header gate
//! - [`routes`] - Router and handlers
//! - [`error`] - Failure to HTTP response mapping

pub mod api_key;
pub mod config;
pub mod error;
pub mod routes;

pub use api_key::ApiKeyGate;
pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
pub use routes::{AppState, build_router};
