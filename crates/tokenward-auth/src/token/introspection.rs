//! Token introspection (RFC 7662)
//!
//! Resource servers ask whether a token is currently active and, if so, what
//! it carries.
//!
//! # Security Considerations
//!
//! - Introspection endpoint requires client authentication
//! - Never reveal why a token is inactive (expired vs revoked vs unknown)
//! - A denylisted `jti` wins over everything the token store says
//! - Store failures are errors, never a silent `{"active":false}`
//!
//! # Lookup Order
//!
//! | `token_type_hint` | Tried as |
//! |-------------------|----------|
//! | `access_token` | access token only |
//! | `refresh_token` | refresh token only |
//! | absent or unrecognized | access token, then refresh token |
//!
//! # References
//!
//! - [RFC 7662 - OAuth 2.0 Token Introspection](https://tools.ietf.org/html/rfc7662)

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::jwt::{Audience, TokenClaims};
use super::revocation::TokenTypeHint;
use super::verifier::{TokenVerifier, Verification, hash_prefix};
use crate::AuthResult;
use crate::clock::Clock;
use crate::storage::{RevokedTokenStorage, TokenStorage};
use crate::types::TokenType;

// =============================================================================
// Request Types
// =============================================================================

/// Token introspection request per RFC 7662.
#[derive(Debug, Clone, Deserialize)]
pub struct IntrospectionRequest {
    /// The token to introspect.
    pub token: String,

    /// Optional hint about the token type.
    #[serde(default)]
    pub token_type_hint: Option<TokenTypeHint>,
}

// =============================================================================
// Response Types
// =============================================================================

/// Token introspection response per RFC 7662.
///
/// An inactive response serializes to exactly `{"active":false}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IntrospectionResponse {
    /// Boolean indicator of whether the token is currently active.
    pub active: bool,

    /// A space-separated list of scope values granted to the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Client the token was issued to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Human-readable identifier for the resource owner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// `access_token` or `refresh_token`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Expiration time (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issued at time (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Not before time (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Subject identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Intended audience(s), in the shape the token carried them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Issuer of the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// JWT ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Application-level permissions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
}

impl IntrospectionResponse {
    /// Creates an inactive response.
    #[must_use]
    pub fn inactive() -> Self {
        Self::default()
    }

    /// Creates an active response with no claims set.
    #[must_use]
    pub fn active() -> Self {
        Self {
            active: true,
            ..Default::default()
        }
    }

    /// Builds an active response from verified claims.
    #[must_use]
    pub fn from_claims(claims: TokenClaims) -> Self {
        Self {
            active: true,
            scope: claims.scope,
            client_id: claims.client_id,
            username: claims.username,
            token_type: None,
            exp: Some(claims.exp),
            iat: claims.iat,
            nbf: claims.nbf,
            sub: Some(claims.sub),
            aud: claims.aud,
            iss: claims.iss,
            jti: claims.jti,
            permissions: claims.permissions,
        }
    }

    /// Sets the scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Sets the client ID.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the token type.
    #[must_use]
    pub fn with_token_type(mut self, token_type: TokenType) -> Self {
        self.token_type = Some(token_type.as_str().to_string());
        self
    }
}

// =============================================================================
// Service
// =============================================================================

/// What a single lookup pass found.
enum Lookup {
    /// The token is active.
    Active(Box<IntrospectionResponse>),
    /// The token verified but is on the denylist; stop looking.
    Denylisted,
    /// Not this kind of token, or not usable.
    Inactive,
}

/// Answers RFC 7662 introspection requests.
#[derive(Clone)]
pub struct IntrospectionService {
    verifier: Arc<TokenVerifier>,
    tokens: Arc<dyn TokenStorage>,
    blacklist: Arc<dyn RevokedTokenStorage>,
    clock: Arc<dyn Clock>,
}

impl IntrospectionService {
    /// Creates a new introspection service.
    #[must_use]
    pub fn new(
        verifier: Arc<TokenVerifier>,
        tokens: Arc<dyn TokenStorage>,
        blacklist: Arc<dyn RevokedTokenStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            verifier,
            tokens,
            blacklist,
            clock,
        }
    }

    /// Introspects a token.
    ///
    /// The caller must already have authenticated the requesting client.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the token store or denylist cannot be
    /// reached. Every token-state outcome is an `Ok` response.
    pub async fn introspect(
        &self,
        request: &IntrospectionRequest,
    ) -> AuthResult<IntrospectionResponse> {
        let order: &[TokenType] = match request.token_type_hint {
            Some(TokenType::AccessToken) => &[TokenType::AccessToken],
            Some(TokenType::RefreshToken) => &[TokenType::RefreshToken],
            None => &[TokenType::AccessToken, TokenType::RefreshToken],
        };

        let token_hash = self.verifier.token_hash(&request.token);

        for token_type in order {
            match self.lookup(*token_type, &request.token, &token_hash).await? {
                Lookup::Active(response) => {
                    tracing::debug!(
                        token_type = %token_type,
                        token_hash = hash_prefix(&token_hash),
                        "Token is active"
                    );
                    return Ok(*response);
                }
                Lookup::Denylisted => {
                    tracing::debug!(
                        token_type = %token_type,
                        token_hash = hash_prefix(&token_hash),
                        "Token is denylisted"
                    );
                    return Ok(IntrospectionResponse::inactive());
                }
                Lookup::Inactive => {}
            }
        }

        tracing::debug!(
            token_hash = hash_prefix(&token_hash),
            "Token is not active"
        );
        Ok(IntrospectionResponse::inactive())
    }

    async fn lookup(
        &self,
        token_type: TokenType,
        raw: &str,
        token_hash: &str,
    ) -> AuthResult<Lookup> {
        let verification = match token_type {
            TokenType::AccessToken => self.verifier.verify_access_token(raw),
            TokenType::RefreshToken => self.verifier.verify_refresh_token(raw),
        };

        let claims = match verification {
            Verification::Valid(claims) => claims,
            Verification::Invalid(reason) => {
                tracing::trace!(token_type = %token_type, reason = %reason, "Token did not verify");
                return Ok(Lookup::Inactive);
            }
        };

        let claim_jti = claims.jti.as_deref().filter(|jti| !jti.is_empty());
        if let Some(jti) = claim_jti
            && self.blacklist.is_revoked(jti).await?
        {
            return Ok(Lookup::Denylisted);
        }

        let now = self.clock.now();
        let row = match token_type {
            TokenType::AccessToken => self
                .tokens
                .find_access_token(token_hash)
                .await?
                .filter(|t| !t.is_expired_at(now))
                .map(|t| StoredToken {
                    client_id: t.client_id.clone(),
                    scope: t.scope.clone(),
                    key: t.blacklist_key(),
                }),
            TokenType::RefreshToken => self
                .tokens
                .find_refresh_token(token_hash)
                .await?
                .filter(|t| t.is_valid_at(now))
                .map(|t| StoredToken {
                    client_id: t.client_id.clone(),
                    scope: t.scope.clone(),
                    key: t.blacklist_key(),
                }),
        };

        let Some(row) = row else {
            return Ok(Lookup::Inactive);
        };

        // Cascades denylist under the row key, which may differ from the claim.
        if claim_jti != Some(row.key.as_str()) && self.blacklist.is_revoked(&row.key).await? {
            return Ok(Lookup::Denylisted);
        }

        Ok(match build_active(claims, row, token_type) {
            Some(response) => Lookup::Active(Box::new(response)),
            None => Lookup::Inactive,
        })
    }
}

/// Fields of the persisted row that feed the response.
struct StoredToken {
    client_id: String,
    scope: String,
    key: String,
}

/// Builds the active payload, or `None` when no `client_id` can be resolved.
fn build_active(
    claims: TokenClaims,
    row: StoredToken,
    token_type: TokenType,
) -> Option<IntrospectionResponse> {
    let claim_client = claims.client_id.clone().filter(|c| !c.is_empty());

    let client_id = match claim_client {
        Some(claimed) if !row.client_id.is_empty() && claimed != row.client_id => {
            tracing::warn!(
                claimed_client_id = %claimed,
                stored_client_id = %row.client_id,
                "Token client_id disagrees with token store"
            );
            return None;
        }
        Some(claimed) => claimed,
        None if !row.client_id.is_empty() => row.client_id.clone(),
        None => {
            tracing::warn!(token_type = %token_type, "Active token has no resolvable client_id");
            return None;
        }
    };

    let mut response = IntrospectionResponse::from_claims(claims)
        .with_client_id(client_id)
        .with_token_type(token_type);

    if response.scope.as_deref().is_none_or(str::is_empty) && !row.scope.is_empty() {
        response = response.with_scope(row.scope);
    }

    Some(response)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::storage::TokenStorage;
    use crate::token::fixtures::Fixture;
    use crate::types::{BlacklistEntry, blacklist_key};
    use time::Duration;

    fn request(token: &str, hint: Option<TokenTypeHint>) -> IntrospectionRequest {
        IntrospectionRequest {
            token: token.to_string(),
            token_type_hint: hint,
        }
    }

    #[test]
    fn test_inactive_serializes_to_active_false_only() {
        let json = serde_json::to_string(&IntrospectionResponse::inactive()).unwrap();
        assert_eq!(json, r#"{"active":false}"#);
    }

    #[test]
    fn test_audience_keeps_claim_shape() {
        let mut response = IntrospectionResponse::active();
        response.aud = Some(Audience::Single("api".to_string()));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["aud"], "api");

        response.aud = Some(Audience::Multiple(vec!["a".to_string(), "b".to_string()]));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["aud"], serde_json::json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_active_access_token() {
        let fx = Fixture::new();
        let (raw, _) = fx.access_token(Some("abc"), "c1", Some("u1"), Duration::hours(1));

        let response = fx.introspection().introspect(&request(&raw, None)).await.unwrap();

        assert!(response.active);
        assert_eq!(response.client_id.as_deref(), Some("c1"));
        assert_eq!(response.sub.as_deref(), Some("u1"));
        assert_eq!(response.jti.as_deref(), Some("abc"));
        assert_eq!(response.scope.as_deref(), Some("read write"));
        assert_eq!(response.token_type.as_deref(), Some("access_token"));
        assert_eq!(response.username.as_deref(), Some("alice"));
        assert_eq!(
            response.permissions,
            Some(vec!["tokens:read".to_string()])
        );
        assert_eq!(response.iss.as_deref(), Some(crate::token::fixtures::ISSUER));
    }

    #[tokio::test]
    async fn test_active_refresh_token_without_hint() {
        let fx = Fixture::new();
        let (raw, _) = fx.refresh_token(Some("r-1"), "c1", Some("u1"), Duration::days(30));

        let response = fx.introspection().introspect(&request(&raw, None)).await.unwrap();

        assert!(response.active);
        assert_eq!(response.token_type.as_deref(), Some("refresh_token"));
    }

    #[tokio::test]
    async fn test_hint_restricts_lookup() {
        let fx = Fixture::new();
        let (access, _) = fx.access_token(Some("a-1"), "c1", Some("u1"), Duration::hours(1));
        let (refresh, _) = fx.refresh_token(Some("r-1"), "c1", Some("u1"), Duration::days(30));
        let service = fx.introspection();

        let wrong = service
            .introspect(&request(&access, Some(TokenType::RefreshToken)))
            .await
            .unwrap();
        assert!(!wrong.active);

        let wrong = service
            .introspect(&request(&refresh, Some(TokenType::AccessToken)))
            .await
            .unwrap();
        assert!(!wrong.active);

        let right = service
            .introspect(&request(&refresh, Some(TokenType::RefreshToken)))
            .await
            .unwrap();
        assert!(right.active);
    }

    #[tokio::test]
    async fn test_blacklist_dominates_store() {
        let fx = Fixture::new();
        let (raw, record) = fx.access_token(Some("abc"), "c1", Some("u1"), Duration::hours(1));
        fx.store
            .upsert(&BlacklistEntry::new("abc", TokenType::AccessToken, record.expires_at))
            .await
            .unwrap();

        let response = fx.introspection().introspect(&request(&raw, None)).await.unwrap();
        assert_eq!(response, IntrospectionResponse::inactive());
    }

    #[tokio::test]
    async fn test_blacklisted_fallback_key_without_jti() {
        let fx = Fixture::new();
        let (raw, record) = fx.access_token(None, "c1", Some("u1"), Duration::hours(1));
        assert!(fx.introspection().introspect(&request(&raw, None)).await.unwrap().active);

        let key = blacklist_key(TokenType::AccessToken, None, record.id);
        fx.store
            .upsert(&BlacklistEntry::new(key, TokenType::AccessToken, record.expires_at))
            .await
            .unwrap();

        assert!(!fx.introspection().introspect(&request(&raw, None)).await.unwrap().active);
    }

    #[tokio::test]
    async fn test_cascade_reaches_row_without_jti_column() {
        use crate::audit::AuditSource;
        use crate::token::revocation::RevocationRequest;
        use crate::types::AccessTokenRecord;

        let fx = Fixture::new();
        let (refresh, _) = fx.refresh_token(Some("r-1"), "C", Some("U"), Duration::days(30));

        // the JWT carries a jti, the stored row does not
        let raw = fx.sign_access(Some("a-1"), "C", Some("U"), Duration::hours(1));
        let now = fx.clock.now();
        let record = AccessTokenRecord {
            id: uuid::Uuid::new_v4(),
            token_hash: crate::token::hash_token(&raw),
            jti: None,
            client_id: "C".to_string(),
            user_id: Some("U".to_string()),
            scope: "read write".to_string(),
            expires_at: now + Duration::hours(1),
            created_at: now,
        };
        fx.store.insert_access_token(record).unwrap();
        assert!(fx.introspection().introspect(&request(&raw, None)).await.unwrap().active);

        fx.revocation()
            .revoke(
                &RevocationRequest {
                    token: refresh,
                    token_type_hint: Some(TokenType::RefreshToken),
                },
                &fx.client("C"),
                &AuditSource::default(),
            )
            .await
            .unwrap();

        let response = fx.introspection().introspect(&request(&raw, None)).await.unwrap();
        assert_eq!(response, IntrospectionResponse::inactive());
    }

    #[tokio::test]
    async fn test_missing_row_is_inactive() {
        let fx = Fixture::new();
        let raw = fx.sign_access(Some("ghost"), "c1", Some("u1"), Duration::hours(1));

        let response = fx.introspection().introspect(&request(&raw, None)).await.unwrap();
        assert!(!response.active);
    }

    #[tokio::test]
    async fn test_expired_row_is_inactive() {
        let fx = Fixture::new();
        // signature still valid; the row says otherwise
        let (raw, mut record) = fx.access_token(Some("abc"), "c1", Some("u1"), Duration::hours(1));
        record.expires_at = fx.clock.now() - Duration::seconds(1);
        fx.store.insert_access_token(record).unwrap();

        let response = fx.introspection().introspect(&request(&raw, None)).await.unwrap();
        assert!(!response.active);
    }

    #[tokio::test]
    async fn test_expired_jwt_is_inactive() {
        let fx = Fixture::new();
        let (raw, _) = fx.access_token(Some("abc"), "c1", Some("u1"), Duration::hours(1));
        fx.clock.advance(Duration::hours(2));

        let response = fx.introspection().introspect(&request(&raw, None)).await.unwrap();
        assert!(!response.active);
    }

    #[tokio::test]
    async fn test_revoked_refresh_row_is_inactive() {
        let fx = Fixture::new();
        let (raw, mut record) = fx.refresh_token(Some("r-1"), "c1", Some("u1"), Duration::days(1));
        record.is_revoked = true;
        record.revoked_at = Some(fx.clock.now());
        fx.store.insert_refresh_token(record).unwrap();

        let response = fx.introspection().introspect(&request(&raw, None)).await.unwrap();
        assert!(!response.active);
    }

    #[tokio::test]
    async fn test_client_id_from_row_when_claim_missing() {
        let fx = Fixture::new();
        let (raw, _) = fx.access_token_with(Some("abc"), None, "c9", Some("u1"), Duration::hours(1));

        let response = fx.introspection().introspect(&request(&raw, None)).await.unwrap();
        assert!(response.active);
        assert_eq!(response.client_id.as_deref(), Some("c9"));
    }

    #[tokio::test]
    async fn test_unresolvable_client_id_fails_closed() {
        let fx = Fixture::new();
        let (raw, _) = fx.access_token_with(Some("abc"), None, "", Some("u1"), Duration::hours(1));

        let response = fx.introspection().introspect(&request(&raw, None)).await.unwrap();
        assert!(!response.active);
    }

    #[tokio::test]
    async fn test_conflicting_client_id_fails_closed() {
        let fx = Fixture::new();
        let (raw, _) =
            fx.access_token_with(Some("abc"), Some("c1"), "c2", Some("u1"), Duration::hours(1));

        let response = fx.introspection().introspect(&request(&raw, None)).await.unwrap();
        assert!(!response.active);
    }

    #[tokio::test]
    async fn test_garbage_token_is_inactive() {
        let fx = Fixture::new();
        for raw in ["", "not-a-jwt", "a.b.c"] {
            let response = fx.introspection().introspect(&request(raw, None)).await.unwrap();
            assert!(!response.active);
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_error_not_inactive() {
        let fx = Fixture::new();
        let (raw, _) = fx.access_token(Some("abc"), "c1", Some("u1"), Duration::hours(1));
        fx.store.set_unavailable(true);

        let result = fx.introspection().introspect(&request(&raw, None)).await;
        assert!(matches!(result, Err(AuthError::Storage { .. })));
    }

    #[tokio::test]
    async fn test_row_lookup_uses_hash() {
        let fx = Fixture::new();
        let (raw, record) = fx.access_token(Some("abc"), "c1", Some("u1"), Duration::hours(1));

        let found = fx
            .store
            .find_access_token(&crate::token::hash_token(&raw))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, record.id);
    }
}
