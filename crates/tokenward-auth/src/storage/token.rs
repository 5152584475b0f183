//! Token store trait.
//!
//! Read access to issued access and refresh tokens plus the one mutation
//! this authority performs: revoking a refresh token together with every
//! live access token issued under the same grant.

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::{AccessTokenRecord, RefreshTokenRecord};

/// A refresh token revocation to apply atomically.
#[derive(Debug, Clone)]
pub struct RefreshRevocation {
    /// Row id of the refresh token.
    pub token_id: Uuid,

    /// Denylist key for the refresh token itself.
    pub blacklist_key: String,

    /// Expiry copied onto the refresh token's denylist entry.
    pub expires_at: OffsetDateTime,

    /// User the grant belongs to.
    pub user_id: Option<String>,

    /// Client the grant belongs to.
    pub client_id: String,

    /// Revocation timestamp; also the cut-off for "still live" access tokens.
    pub revoked_at: OffsetDateTime,
}

impl RefreshRevocation {
    /// Prepares the revocation of `token` at `now`.
    #[must_use]
    pub fn new(token: &RefreshTokenRecord, blacklist_key: String, now: OffsetDateTime) -> Self {
        Self {
            token_id: token.id,
            blacklist_key,
            expires_at: token.expires_at,
            user_id: token.user_id.clone(),
            client_id: token.client_id.clone(),
            revoked_at: now,
        }
    }
}

/// Storage operations for issued tokens.
///
/// Lookups are by SHA-256 hash (see [`crate::token::hash_token`]).
/// Expiry is not filtered here; callers compare against their clock.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Find an access token by hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_access_token(&self, token_hash: &str) -> AuthResult<Option<AccessTokenRecord>>;

    /// Find an access token by hash, only if it was issued to `client_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_access_token_for_client(
        &self,
        token_hash: &str,
        client_id: &str,
    ) -> AuthResult<Option<AccessTokenRecord>>;

    /// Find a refresh token by hash, revoked or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_refresh_token(&self, token_hash: &str)
    -> AuthResult<Option<RefreshTokenRecord>>;

    /// Find a refresh token by hash, only if it was issued to `client_id`
    /// and is not yet revoked.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_active_refresh_token_for_client(
        &self,
        token_hash: &str,
        client_id: &str,
    ) -> AuthResult<Option<RefreshTokenRecord>>;

    /// Revoke a refresh token and cascade to its access tokens.
    ///
    /// Implementations must apply all of the following as one atomic unit:
    ///
    /// 1. set `is_revoked = true, revoked_at = revocation.revoked_at` on the refresh token
    /// 2. upsert the refresh token's own denylist entry
    /// 3. upsert a denylist entry for every access token of the same
    ///    (user, client) with `expires_at > revoked_at`, as one batch
    ///
    /// If any step fails, none of them may be visible afterwards.
    ///
    /// # Returns
    ///
    /// Returns the number of access tokens added to the denylist, or `0`
    /// without changing anything when the refresh token is already revoked.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails; nothing was changed.
    async fn revoke_refresh_token(&self, revocation: &RefreshRevocation) -> AuthResult<u64>;
}
