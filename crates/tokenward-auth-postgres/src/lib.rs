//! PostgreSQL storage backend for tokenward
//!
//! Provides persistent storage for:
//!
//! - OAuth clients (`oauth_clients`)
//! - Issued access and refresh tokens (`access_tokens`, `refresh_tokens`)
//! - The revocation denylist (`token_blacklist`)
//! - Revocation audit events (`audit_log`)
//!
//! The schema ships embedded in the binary; call
//! [`PostgresAuthStorage::migrate`] once at startup.
//!
//! # Example
//!
//! ```ignore
//! use tokenward_auth_postgres::PostgresAuthStorage;
//!
//! let storage = PostgresAuthStorage::connect("postgres://localhost/tokenward").await?;
//! storage.migrate().await?;
//!
//! let client = storage.clients().find_by_client_id("my-app").await?;
//! ```

pub mod audit;
pub mod client;
pub mod migrations;
pub mod revoked_token;
pub mod storage_adapters;
pub mod token;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx_core::pool::{Pool, PoolOptions};
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::Postgres;
use tokenward_auth::storage::StorageHealth;
use tokenward_auth::{AuthError, AuthResult};

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

pub use audit::PostgresAuditSink;
pub use client::ClientStorage;
pub use revoked_token::RevokedTokenStorage;
pub use storage_adapters::{ArcClientStorage, ArcRevokedTokenStorage, ArcTokenStorage};
pub use token::TokenStorage;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Schema migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx_core::migrate::MigrateError),

    /// A stored value could not be mapped to a domain type.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl StorageError {
    /// Create an `InvalidData` error.
    #[must_use]
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }

    /// Returns `true` if this is a database error.
    #[must_use]
    pub fn is_database_error(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        AuthError::storage(err.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// Pool Options
// =============================================================================

/// Connection pool settings.
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    /// Maximum number of pooled connections.
    pub pool_size: u32,
    /// How long to wait for a connection before failing.
    pub connect_timeout: Duration,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self {
            pool_size: 10,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

// =============================================================================
// PostgreSQL Auth Storage
// =============================================================================

/// PostgreSQL storage backend for token authority data.
#[derive(Debug, Clone)]
pub struct PostgresAuthStorage {
    pool: Arc<PgPool>,
}

impl PostgresAuthStorage {
    /// Create new storage with an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create new storage by connecting to the database with default options.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with(database_url, &PostgresOptions::default()).await
    }

    /// Create new storage by connecting to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect_with(database_url: &str, options: &PostgresOptions) -> StorageResult<Self> {
        let pool = PoolOptions::<Postgres>::new()
            .max_connections(options.pool_size)
            .acquire_timeout(options.connect_timeout)
            .connect(database_url)
            .await?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Applies pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails to execute.
    pub async fn migrate(&self) -> StorageResult<()> {
        migrations::run(&self.pool).await
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get a reference to the Arc-wrapped pool.
    #[must_use]
    pub fn pool_arc(&self) -> Arc<PgPool> {
        Arc::clone(&self.pool)
    }

    // -------------------------------------------------------------------------
    // Storage Accessors
    // -------------------------------------------------------------------------

    /// Get client storage operations.
    #[must_use]
    pub fn clients(&self) -> ClientStorage<'_> {
        ClientStorage::new(&self.pool)
    }

    /// Get token storage operations.
    #[must_use]
    pub fn tokens(&self) -> TokenStorage<'_> {
        TokenStorage::new(&self.pool)
    }

    /// Get revoked token storage operations.
    #[must_use]
    pub fn revoked_tokens(&self) -> RevokedTokenStorage<'_> {
        RevokedTokenStorage::new(&self.pool)
    }
}

#[async_trait]
impl StorageHealth for PostgresAuthStorage {
    async fn ping(&self) -> AuthResult<()> {
        let _: i32 = query_scalar("SELECT 1")
            .fetch_one(self.pool.as_ref())
            .await
            .map_err(StorageError::from)?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_maps_to_auth_storage_error() {
        let err: AuthError = StorageError::invalid_data("client_type 'robot'").into();
        assert!(matches!(err, AuthError::Storage { .. }));
        assert!(err.is_server_error());
    }

    #[test]
    fn test_connect_rejects_malformed_url() {
        let result = tokio_test::block_on(PostgresAuthStorage::connect("not a database url"));
        let err = result.unwrap_err();
        assert!(err.is_database_error());
    }

    #[test]
    fn test_default_options() {
        let options = PostgresOptions::default();
        assert_eq!(options.pool_size, 10);
        assert_eq!(options.connect_timeout, Duration::from_secs(5));
    }
}
