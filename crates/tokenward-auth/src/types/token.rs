//! Persisted token records.
//!
//! Rows are created at grant time by the issuing side; this crate only reads
//! them and flips refresh-token revocation state.
//!
//! # Storage Security
//!
//! The token itself is never stored. Only a SHA-256 hash is persisted. To
//! look a token up:
//!
//! 1. Hash the incoming token with [`crate::token::hash_token`]
//! 2. Look up by hash
//! 3. Validate expiration (and, for refresh tokens, revocation status)

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// The two token kinds this authority knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// A short-lived access token.
    AccessToken,
    /// A long-lived refresh token.
    RefreshToken,
}

impl TokenType {
    /// Returns the token type as its wire string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
        }
    }

    /// Parses a wire string, returning `None` for anything unrecognized.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "access_token" => Some(Self::AccessToken),
            "refresh_token" => Some(Self::RefreshToken),
            _ => None,
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An issued access token.
///
/// Never deleted; rows stay behind as an audit trail after expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenRecord {
    /// Unique identifier for this token record.
    pub id: Uuid,

    /// SHA-256 hex digest of the raw token.
    pub token_hash: String,

    /// The token's `jti` claim, when the issuer recorded it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Client the token was issued to.
    pub client_id: String,

    /// User that authorized the token (None for client credentials).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Granted scopes (space-separated).
    pub scope: String,

    /// When this token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// When this token was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl AccessTokenRecord {
    /// Returns `true` if the token has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }

    /// The key this token is blacklisted under.
    #[must_use]
    pub fn blacklist_key(&self) -> String {
        blacklist_key(TokenType::AccessToken, self.jti.as_deref(), self.id)
    }
}

/// An issued refresh token.
///
/// Mutated only to flip revocation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRecord {
    /// Unique identifier for this token record.
    pub id: Uuid,

    /// SHA-256 hex digest of the raw token.
    pub token_hash: String,

    /// The token's `jti` claim, when the issuer recorded it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Client the token was issued to.
    pub client_id: String,

    /// User that authorized the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Granted scopes (space-separated).
    pub scope: String,

    /// When this token expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Whether the token has been revoked.
    #[serde(default)]
    pub is_revoked: bool,

    /// When this token was revoked.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub revoked_at: Option<OffsetDateTime>,

    /// When this token was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl RefreshTokenRecord {
    /// Returns `true` if the token has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }

    /// Returns `true` if this token is usable at `now` (not expired and not revoked).
    #[must_use]
    pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
        !self.is_revoked && !self.is_expired_at(now)
    }

    /// The key this token is blacklisted under.
    #[must_use]
    pub fn blacklist_key(&self) -> String {
        blacklist_key(TokenType::RefreshToken, self.jti.as_deref(), self.id)
    }
}

/// Computes the denylist key for a token.
///
/// The `jti` is used when known. Tokens without one fall back to
/// `{token_type}:{row id}`, which cannot collide with a real `jti` issued for
/// the other token kind.
#[must_use]
pub fn blacklist_key(token_type: TokenType, jti: Option<&str>, id: Uuid) -> String {
    match jti {
        Some(jti) if !jti.is_empty() => jti.to_string(),
        _ => format!("{}:{}", token_type.as_str(), id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn refresh_record(now: OffsetDateTime) -> RefreshTokenRecord {
        RefreshTokenRecord {
            id: Uuid::new_v4(),
            token_hash: "hash".to_string(),
            jti: None,
            client_id: "client-a".to_string(),
            user_id: Some("user-1".to_string()),
            scope: "openid".to_string(),
            expires_at: now + Duration::days(30),
            is_revoked: false,
            revoked_at: None,
            created_at: now,
        }
    }

    #[test]
    fn test_token_type_parse() {
        assert_eq!(
            TokenType::parse("access_token"),
            Some(TokenType::AccessToken)
        );
        assert_eq!(
            TokenType::parse("refresh_token"),
            Some(TokenType::RefreshToken)
        );
        assert_eq!(TokenType::parse("id_token"), None);
        assert_eq!(TokenType::parse("ACCESS_TOKEN"), None);
    }

    #[test]
    fn test_blacklist_key_prefers_jti() {
        let id = Uuid::new_v4();
        assert_eq!(
            blacklist_key(TokenType::AccessToken, Some("abc"), id),
            "abc"
        );
        assert_eq!(
            blacklist_key(TokenType::AccessToken, None, id),
            format!("access_token:{id}")
        );
        assert_eq!(
            blacklist_key(TokenType::RefreshToken, Some(""), id),
            format!("refresh_token:{id}")
        );
    }

    #[test]
    fn test_refresh_token_validity() {
        let now = OffsetDateTime::now_utc();
        let mut record = refresh_record(now);
        assert!(record.is_valid_at(now));
        assert!(!record.is_valid_at(now + Duration::days(31)));

        record.is_revoked = true;
        record.revoked_at = Some(now);
        assert!(!record.is_valid_at(now));
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let now = OffsetDateTime::now_utc();
        let record = refresh_record(now);
        assert!(record.is_expired_at(record.expires_at));
        assert!(!record.is_expired_at(record.expires_at - Duration::seconds(1)));
    }
}
