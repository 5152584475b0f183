//! Token revocation (RFC 7009)
//!
//! # Security Considerations
//!
//! - Revocation endpoint always returns 200 OK once the client is
//!   authenticated (don't reveal token existence or ownership)
//! - Client must own the token to revoke it
//! - Revoked tokens are tracked on the denylist until they expire
//! - Revoking a refresh token also denylists every live access token of the
//!   same (user, client) pair, atomically
//! - Exactly one audit event is emitted per attempt
//!
//! # Branch Order
//!
//! The access-token branch runs first unless the hint is `refresh_token`.
//! The second branch only runs if the first did not find a token owned by
//! the caller.
//!
//! # References
//!
//! - [RFC 7009 - OAuth 2.0 Token Revocation](https://tools.ietf.org/html/rfc7009)

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;

use super::verifier::{hash_prefix, hash_token, peek_jti};
use crate::AuthResult;
use crate::audit::{AuditAction, AuditEvent, AuditSink, AuditSource};
use crate::clock::Clock;
use crate::storage::{RefreshRevocation, RevokedTokenStorage, TokenStorage};
use crate::types::{BlacklistEntry, Client, TokenType, blacklist_key};

/// Resource name recorded on revocation audit events.
pub const AUDIT_RESOURCE: &str = "oauth_token";

// =============================================================================
// Request Types
// =============================================================================

/// Token type hint sent with introspection and revocation requests.
pub type TokenTypeHint = TokenType;

/// Parses a token type hint string.
///
/// Unrecognized values yield `None` and are treated as an absent hint.
#[must_use]
pub fn parse_token_type_hint(hint: &str) -> Option<TokenTypeHint> {
    TokenType::parse(hint)
}

/// Token revocation request per RFC 7009.
#[derive(Debug, Clone, Deserialize)]
pub struct RevocationRequest {
    /// The token to revoke.
    pub token: String,

    /// Optional hint about the token type.
    #[serde(default)]
    pub token_type_hint: Option<TokenTypeHint>,
}

/// What a revocation attempt did.
///
/// Only logs and tests look at this; the HTTP response is the same for
/// every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevocationOutcome {
    /// An access token owned by the caller was denylisted.
    AccessTokenRevoked,
    /// A refresh token was revoked along with `cascaded` access tokens.
    RefreshTokenRevoked {
        /// Number of access tokens denylisted by the cascade.
        cascaded: u64,
    },
    /// No live token owned by the caller matched.
    NotFound,
}

// =============================================================================
// Service
// =============================================================================

/// Performs RFC 7009 revocations.
#[derive(Clone)]
pub struct RevocationService {
    tokens: Arc<dyn TokenStorage>,
    blacklist: Arc<dyn RevokedTokenStorage>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl RevocationService {
    /// Creates a new revocation service.
    #[must_use]
    pub fn new(
        tokens: Arc<dyn TokenStorage>,
        blacklist: Arc<dyn RevokedTokenStorage>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tokens,
            blacklist,
            audit,
            clock,
        }
    }

    /// Revokes a token on behalf of an authenticated client.
    ///
    /// Unknown, expired, already revoked and foreign tokens all yield
    /// [`RevocationOutcome::NotFound`]. One audit event is recorded whatever
    /// happens.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store could not be read or the
    /// revocation could not be committed. Nothing was changed in that case.
    pub async fn revoke(
        &self,
        request: &RevocationRequest,
        client: &Client,
        source: &AuditSource,
    ) -> AuthResult<RevocationOutcome> {
        let token_hash = hash_token(&request.token);

        let result = self.apply(request, client, &token_hash).await;

        match &result {
            Ok(outcome) => tracing::debug!(
                client_id = %client.client_id,
                token_hash = hash_prefix(&token_hash),
                outcome = ?outcome,
                "Revocation request processed"
            ),
            Err(e) => tracing::error!(
                client_id = %client.client_id,
                token_hash = hash_prefix(&token_hash),
                error = %e,
                "Revocation failed"
            ),
        }

        self.record_audit(request, client, &token_hash, source, result.is_ok())
            .await;

        result
    }

    async fn apply(
        &self,
        request: &RevocationRequest,
        client: &Client,
        token_hash: &str,
    ) -> AuthResult<RevocationOutcome> {
        // Unverified: only used to pick the denylist key. Ownership is
        // decided by the hash lookup below.
        let peeked_jti = peek_jti(&request.token);

        let order = match request.token_type_hint {
            Some(TokenType::RefreshToken) => [TokenType::RefreshToken, TokenType::AccessToken],
            _ => [TokenType::AccessToken, TokenType::RefreshToken],
        };

        for token_type in order {
            let outcome = match token_type {
                TokenType::AccessToken => {
                    self.revoke_access_token(token_hash, client, peeked_jti.as_deref())
                        .await?
                }
                TokenType::RefreshToken => {
                    self.revoke_refresh_token(token_hash, client, peeked_jti.as_deref())
                        .await?
                }
            };
            if let Some(outcome) = outcome {
                return Ok(outcome);
            }
        }

        Ok(RevocationOutcome::NotFound)
    }

    async fn revoke_access_token(
        &self,
        token_hash: &str,
        client: &Client,
        peeked_jti: Option<&str>,
    ) -> AuthResult<Option<RevocationOutcome>> {
        let Some(token) = self
            .tokens
            .find_access_token_for_client(token_hash, &client.client_id)
            .await?
        else {
            return Ok(None);
        };

        let key = blacklist_key(
            TokenType::AccessToken,
            peeked_jti.or(token.jti.as_deref()),
            token.id,
        );
        self.blacklist
            .upsert(&BlacklistEntry::new(
                key,
                TokenType::AccessToken,
                token.expires_at,
            ))
            .await?;

        tracing::info!(
            client_id = %client.client_id,
            token_id = %token.id,
            "Access token revoked"
        );

        Ok(Some(RevocationOutcome::AccessTokenRevoked))
    }

    async fn revoke_refresh_token(
        &self,
        token_hash: &str,
        client: &Client,
        peeked_jti: Option<&str>,
    ) -> AuthResult<Option<RevocationOutcome>> {
        let Some(token) = self
            .tokens
            .find_active_refresh_token_for_client(token_hash, &client.client_id)
            .await?
        else {
            return Ok(None);
        };

        let key = blacklist_key(
            TokenType::RefreshToken,
            peeked_jti.or(token.jti.as_deref()),
            token.id,
        );
        let revocation = RefreshRevocation::new(&token, key, self.clock.now());
        let cascaded = self.tokens.revoke_refresh_token(&revocation).await?;

        tracing::info!(
            client_id = %client.client_id,
            token_id = %token.id,
            cascaded,
            "Refresh token revoked"
        );

        Ok(Some(RevocationOutcome::RefreshTokenRevoked { cascaded }))
    }

    async fn record_audit(
        &self,
        request: &RevocationRequest,
        client: &Client,
        token_hash: &str,
        source: &AuditSource,
        success: bool,
    ) {
        let event = AuditEvent {
            client_id: client.client_id.clone(),
            action: AuditAction::TokenRevoke,
            resource: AUDIT_RESOURCE.to_string(),
            ip: source.ip_address,
            user_agent: source.user_agent.clone(),
            success,
            metadata: json!({
                "tokenTypeHint": request.token_type_hint.map(|hint| hint.as_str()),
                "tokenHashPrefix": hash_prefix(token_hash),
            }),
            occurred_at: self.clock.now(),
        };

        if let Err(e) = self.audit.record(&event).await {
            tracing::warn!(
                client_id = %client.client_id,
                error = %e,
                "Failed to record revocation audit event"
            );
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::error::AuthError;
    use crate::storage::MemoryStore;
    use crate::token::fixtures::Fixture;
    use time::Duration;

    fn request(token: &str, hint: Option<TokenTypeHint>) -> RevocationRequest {
        RevocationRequest {
            token: token.to_string(),
            token_type_hint: hint,
        }
    }

    #[test]
    fn test_parse_token_type_hint() {
        assert_eq!(
            parse_token_type_hint("access_token"),
            Some(TokenTypeHint::AccessToken)
        );
        assert_eq!(
            parse_token_type_hint("refresh_token"),
            Some(TokenTypeHint::RefreshToken)
        );
        assert_eq!(parse_token_type_hint("unknown"), None);
        assert_eq!(parse_token_type_hint(""), None);
    }

    #[tokio::test]
    async fn test_revoke_access_token_blacklists_jti() {
        let fx = Fixture::new();
        let (raw, record) = fx.access_token(Some("abc"), "c1", Some("u1"), Duration::hours(1));

        let outcome = fx
            .revocation()
            .revoke(&request(&raw, None), &fx.client("c1"), &AuditSource::default())
            .await
            .unwrap();

        assert_eq!(outcome, RevocationOutcome::AccessTokenRevoked);
        let entry = fx.store.find("abc").await.unwrap().unwrap();
        assert_eq!(entry.token_type, TokenType::AccessToken);
        assert_eq!(entry.expires_at, record.expires_at);
    }

    #[tokio::test]
    async fn test_revoke_twice_is_idempotent() {
        let fx = Fixture::new();
        let (raw, _) = fx.access_token(Some("abc"), "c1", Some("u1"), Duration::hours(1));
        let service = fx.revocation();
        let client = fx.client("c1");

        for _ in 0..2 {
            service
                .revoke(&request(&raw, None), &client, &AuditSource::default())
                .await
                .unwrap();
        }

        assert_eq!(fx.store.blacklist_len().unwrap(), 1);
        assert_eq!(fx.audit.events().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_token_is_not_found() {
        let fx = Fixture::new();

        let outcome = fx
            .revocation()
            .revoke(&request("no-such-token", None), &fx.client("c1"), &AuditSource::default())
            .await
            .unwrap();

        assert_eq!(outcome, RevocationOutcome::NotFound);
        assert_eq!(fx.store.blacklist_len().unwrap(), 0);
        assert_eq!(fx.audit.events().len(), 1);
    }

    #[tokio::test]
    async fn test_foreign_token_untouched() {
        let fx = Fixture::new();
        let (access, _) = fx.access_token(Some("b-access"), "B", Some("u1"), Duration::hours(1));
        let (refresh, _) = fx.refresh_token(Some("b-refresh"), "B", Some("u1"), Duration::days(1));
        let service = fx.revocation();
        let client_a = fx.client("A");

        for raw in [&access, &refresh] {
            let outcome = service
                .revoke(&request(raw, None), &client_a, &AuditSource::default())
                .await
                .unwrap();
            assert_eq!(outcome, RevocationOutcome::NotFound);
        }

        assert_eq!(fx.store.blacklist_len().unwrap(), 0);
        let stored = fx
            .store
            .find_refresh_token(&hash_token(&refresh))
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.is_revoked);
    }

    #[tokio::test]
    async fn test_revoke_refresh_token_cascades() {
        let fx = Fixture::new();
        let (refresh, _) = fx.refresh_token(Some("r-1"), "C", Some("U"), Duration::days(30));
        fx.access_token(Some("a-1"), "C", Some("U"), Duration::hours(1));
        fx.access_token(Some("a-2"), "C", Some("U"), Duration::minutes(10));
        fx.access_token(Some("a-3"), "C", Some("U"), Duration::minutes(30));
        // same user, other client
        fx.access_token(Some("x-1"), "D", Some("U"), Duration::hours(1));

        let outcome = fx
            .revocation()
            .revoke(
                &request(&refresh, Some(TokenType::RefreshToken)),
                &fx.client("C"),
                &AuditSource::default(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, RevocationOutcome::RefreshTokenRevoked { cascaded: 3 });
        for jti in ["r-1", "a-1", "a-2", "a-3"] {
            assert!(fx.store.is_revoked(jti).await.unwrap(), "{jti} not blacklisted");
        }
        assert!(!fx.store.is_revoked("x-1").await.unwrap());

        let stored = fx
            .store
            .find_refresh_token(&hash_token(&refresh))
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_revoked);
        assert_eq!(stored.revoked_at, Some(fx.clock.now()));
    }

    #[tokio::test]
    async fn test_failed_cascade_is_atomic() {
        // the refresh entry fits, the three access entries do not
        let fx = Fixture::with_store(MemoryStore::new().with_blacklist_capacity(2));
        let (refresh, _) = fx.refresh_token(Some("r-1"), "C", Some("U"), Duration::days(30));
        fx.access_token(Some("a-1"), "C", Some("U"), Duration::hours(1));
        fx.access_token(Some("a-2"), "C", Some("U"), Duration::hours(1));
        fx.access_token(Some("a-3"), "C", Some("U"), Duration::hours(1));

        let result = fx
            .revocation()
            .revoke(&request(&refresh, None), &fx.client("C"), &AuditSource::default())
            .await;

        assert!(matches!(result, Err(AuthError::Storage { .. })));
        assert_eq!(fx.store.blacklist_len().unwrap(), 0);
        let stored = fx
            .store
            .find_refresh_token(&hash_token(&refresh))
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.is_revoked);

        let events = fx.audit.events();
        assert_eq!(events.len(), 1);
        assert!(!events[0].success);
    }

    #[tokio::test]
    async fn test_revoked_refresh_token_second_time_not_found() {
        let fx = Fixture::new();
        let (refresh, _) = fx.refresh_token(Some("r-1"), "C", Some("U"), Duration::days(30));
        let service = fx.revocation();
        let client = fx.client("C");

        let first = service
            .revoke(&request(&refresh, None), &client, &AuditSource::default())
            .await
            .unwrap();
        let second = service
            .revoke(&request(&refresh, None), &client, &AuditSource::default())
            .await
            .unwrap();

        assert_eq!(first, RevocationOutcome::RefreshTokenRevoked { cascaded: 0 });
        assert_eq!(second, RevocationOutcome::NotFound);
        assert_eq!(fx.store.blacklist_len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_wrong_hint_falls_through() {
        let fx = Fixture::new();
        let (raw, _) = fx.access_token(Some("abc"), "c1", Some("u1"), Duration::hours(1));

        let outcome = fx
            .revocation()
            .revoke(
                &request(&raw, Some(TokenType::RefreshToken)),
                &fx.client("c1"),
                &AuditSource::default(),
            )
            .await
            .unwrap();

        assert_eq!(outcome, RevocationOutcome::AccessTokenRevoked);
        assert!(fx.store.is_revoked("abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_token_without_jti_uses_discriminated_key() {
        let fx = Fixture::new();
        let (raw, record) = fx.access_token(None, "c1", Some("u1"), Duration::hours(1));

        fx.revocation()
            .revoke(&request(&raw, None), &fx.client("c1"), &AuditSource::default())
            .await
            .unwrap();

        let key = format!("access_token:{}", record.id);
        assert!(fx.store.is_revoked(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_audit_event_contents() {
        let fx = Fixture::new();
        let (raw, _) = fx.access_token(Some("abc"), "c1", Some("u1"), Duration::hours(1));
        let source = AuditSource {
            ip_address: Some("192.0.2.7".parse().unwrap()),
            user_agent: Some("curl/8".to_string()),
        };

        fx.revocation()
            .revoke(
                &request(&raw, Some(TokenType::AccessToken)),
                &fx.client("c1"),
                &source,
            )
            .await
            .unwrap();

        let events = fx.audit.events();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.client_id, "c1");
        assert_eq!(event.action, AuditAction::TokenRevoke);
        assert_eq!(event.resource, AUDIT_RESOURCE);
        assert!(event.success);
        assert_eq!(event.ip, source.ip_address);
        assert_eq!(event.user_agent.as_deref(), Some("curl/8"));
        assert_eq!(event.metadata["tokenTypeHint"], "access_token");

        let prefix = event.metadata["tokenHashPrefix"].as_str().unwrap();
        assert_eq!(prefix, hash_prefix(&hash_token(&raw)));
        assert!(!event.metadata.to_string().contains(&raw));
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_change_outcome() {
        let fx = Fixture::new();
        let (raw, _) = fx.access_token(Some("abc"), "c1", Some("u1"), Duration::hours(1));
        let service = RevocationService::new(
            fx.store.clone(),
            fx.store.clone(),
            Arc::new(MemoryAuditSink::failing()),
            fx.clock.clone(),
        );

        let outcome = service
            .revoke(&request(&raw, None), &fx.client("c1"), &AuditSource::default())
            .await
            .unwrap();

        assert_eq!(outcome, RevocationOutcome::AccessTokenRevoked);
    }

    #[tokio::test]
    async fn test_store_unavailable_is_error() {
        let fx = Fixture::new();
        let (raw, _) = fx.access_token(Some("abc"), "c1", Some("u1"), Duration::hours(1));
        fx.store.set_unavailable(true);

        let result = fx
            .revocation()
            .revoke(&request(&raw, None), &fx.client("c1"), &AuditSource::default())
            .await;

        assert!(matches!(result, Err(AuthError::Storage { .. })));
        assert_eq!(fx.audit.events().len(), 1);
    }
}
