pub mod config;
pub mod handlers;
pub mod maintenance;
pub mod middleware;
pub mod observability;
pub mod server;

pub use config::{AppConfig, ConfigError, LoggingConfig, PostgresStorageConfig, ServerConfig, StorageBackend};
pub use observability::{apply_logging_level, init_tracing};
pub use server::{Backends, ServerBuilder, TokenwardServer, build_app};
