//! Arc-owning storage adapters for use by the HTTP services.
//!
//! These adapters wrap the lifetime-based storage types and own an Arc<PgPool>,
//! allowing them to be used as `Arc<dyn Storage>` in service state.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;

use tokenward_auth::AuthResult;
use tokenward_auth::storage::{
    ClientStorage as ClientStorageTrait, RefreshRevocation,
    RevokedTokenStorage as RevokedTokenStorageTrait, TokenStorage as TokenStorageTrait,
};
use tokenward_auth::types::{AccessTokenRecord, BlacklistEntry, Client, RefreshTokenRecord};

use crate::PgPool;
use crate::client::ClientStorage;
use crate::revoked_token::RevokedTokenStorage;
use crate::token::TokenStorage;

// =============================================================================
// Arc-Owning Client Storage
// =============================================================================

/// Arc-owning PostgreSQL client storage adapter.
#[derive(Clone)]
pub struct ArcClientStorage {
    pool: Arc<PgPool>,
}

impl ArcClientStorage {
    /// Create a new Arc-owning client storage.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientStorageTrait for ArcClientStorage {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
        let storage = ClientStorage::new(&self.pool);
        Ok(storage.find_by_client_id(client_id).await?)
    }
}

// =============================================================================
// Arc-Owning Token Storage
// =============================================================================

/// Arc-owning PostgreSQL token storage adapter.
#[derive(Clone)]
pub struct ArcTokenStorage {
    pool: Arc<PgPool>,
}

impl ArcTokenStorage {
    /// Create a new Arc-owning token storage.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStorageTrait for ArcTokenStorage {
    async fn find_access_token(&self, token_hash: &str) -> AuthResult<Option<AccessTokenRecord>> {
        let storage = TokenStorage::new(&self.pool);
        Ok(storage.find_access_token(token_hash).await?)
    }

    async fn find_access_token_for_client(
        &self,
        token_hash: &str,
        client_id: &str,
    ) -> AuthResult<Option<AccessTokenRecord>> {
        let storage = TokenStorage::new(&self.pool);
        Ok(storage
            .find_access_token_for_client(token_hash, client_id)
            .await?)
    }

    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> AuthResult<Option<RefreshTokenRecord>> {
        let storage = TokenStorage::new(&self.pool);
        Ok(storage.find_refresh_token(token_hash).await?)
    }

    async fn find_active_refresh_token_for_client(
        &self,
        token_hash: &str,
        client_id: &str,
    ) -> AuthResult<Option<RefreshTokenRecord>> {
        let storage = TokenStorage::new(&self.pool);
        Ok(storage
            .find_active_refresh_token_for_client(token_hash, client_id)
            .await?)
    }

    async fn revoke_refresh_token(&self, revocation: &RefreshRevocation) -> AuthResult<u64> {
        let storage = TokenStorage::new(&self.pool);
        Ok(storage.revoke_refresh_token(revocation).await?)
    }
}

// =============================================================================
// Arc-Owning Revoked Token Storage
// =============================================================================

/// Arc-owning PostgreSQL revoked token storage adapter.
#[derive(Clone)]
pub struct ArcRevokedTokenStorage {
    pool: Arc<PgPool>,
}

impl ArcRevokedTokenStorage {
    /// Create a new Arc-owning revoked token storage.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevokedTokenStorageTrait for ArcRevokedTokenStorage {
    async fn upsert(&self, entry: &BlacklistEntry) -> AuthResult<()> {
        let storage = RevokedTokenStorage::new(&self.pool);
        Ok(storage.upsert(entry).await?)
    }

    async fn is_revoked(&self, jti: &str) -> AuthResult<bool> {
        let storage = RevokedTokenStorage::new(&self.pool);
        Ok(storage.is_revoked(jti).await?)
    }

    async fn find(&self, jti: &str) -> AuthResult<Option<BlacklistEntry>> {
        let storage = RevokedTokenStorage::new(&self.pool);
        Ok(storage.find(jti).await?)
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        let storage = RevokedTokenStorage::new(&self.pool);
        Ok(storage.purge_expired(now).await?)
    }
}
