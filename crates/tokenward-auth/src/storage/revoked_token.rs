//! Revocation denylist storage trait.
//!
//! When a token is revoked, its `jti` (or fallback key) is stored until the
//! token would have naturally expired. Introspection consults the denylist
//! before anything else.
//!
//! # Security Considerations
//!
//! - Entries must be stored with the token's original expiration time
//! - Lookups must be fast; every introspection of a JWT with a `jti` pays for one
//! - Expired entries should be purged periodically
//! - Storage should be persistent across server restarts

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::types::BlacklistEntry;

/// Storage trait for the revocation denylist.
///
/// # Implementations
///
/// - [`crate::storage::MemoryStore`] - in-process, for tests and development
/// - `tokenward-auth-postgres` - PostgreSQL storage backend
#[async_trait]
pub trait RevokedTokenStorage: Send + Sync {
    /// Inserts or refreshes a denylist entry.
    ///
    /// # Idempotency
    ///
    /// Re-revoking an already listed `jti` overwrites its `expires_at` and
    /// `token_type`, and never errors. Exactly one entry exists per `jti`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn upsert(&self, entry: &BlacklistEntry) -> AuthResult<()>;

    /// Checks whether a `jti` is on the denylist.
    ///
    /// Entries count until purged, even past their `expires_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn is_revoked(&self, jti: &str) -> AuthResult<bool>;

    /// Fetches a single entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find(&self, jti: &str) -> AuthResult<Option<BlacklistEntry>>;

    /// Deletes entries whose `expires_at` is at or before `now`.
    ///
    /// # Returns
    ///
    /// Returns the number of entries deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn purge_expired(&self, now: OffsetDateTime) -> AuthResult<u64>;
}
