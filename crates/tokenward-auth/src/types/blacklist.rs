//! Revocation denylist entries.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::token::TokenType;

/// A revoked token identifier.
///
/// Entries are authoritative over every other signal: a token whose key is
/// present here is inactive even if its signature verifies and its store row
/// looks live. They may be purged once `expires_at` has passed, at which
/// point the token would be rejected as expired anyway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistEntry {
    /// The token's `jti`, or a `{token_type}:{row id}` fallback key.
    pub jti: String,

    /// Kind of token that was revoked.
    pub token_type: TokenType,

    /// When the underlying token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl BlacklistEntry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(jti: impl Into<String>, token_type: TokenType, expires_at: OffsetDateTime) -> Self {
        Self {
            jti: jti.into(),
            token_type,
            expires_at,
        }
    }

    /// Returns `true` if the entry can be purged at `now`.
    #[must_use]
    pub fn is_purgeable_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }
}
