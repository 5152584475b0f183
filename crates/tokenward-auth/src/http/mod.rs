//! HTTP handlers for the OAuth 2.0 token endpoints.
//!
//! # Available Handlers
//!
//! - [`introspect`] - Token introspection endpoint (RFC 7662)
//! - [`revoke`] - Token revocation endpoint (RFC 7009)
//!
//! Both take an `application/x-www-form-urlencoded` body with the same
//! shape ([`TokenForm`]) and share [`OAuthState`].

pub mod introspect;
pub mod revoke;

use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::FormRejection;
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::post;
use serde::Deserialize;

use crate::audit::AuditSource;
use crate::oauth::client_auth::ClientCredentials;
use crate::oauth::error::OAuthErrorResponse;
use crate::storage::ClientStorage;
use crate::token::introspection::IntrospectionService;
use crate::token::revocation::{RevocationService, TokenTypeHint, parse_token_type_hint};

pub use introspect::introspect_handler;
pub use revoke::revoke_handler;

/// Path of the introspection endpoint.
pub const INTROSPECT_PATH: &str = "/oauth/introspect";

/// Path of the revocation endpoint.
pub const REVOKE_PATH: &str = "/oauth/revoke";

// =============================================================================
// State Types
// =============================================================================

/// State required by the token endpoints.
#[derive(Clone)]
pub struct OAuthState {
    /// Introspection service.
    pub introspection: Arc<IntrospectionService>,
    /// Revocation service.
    pub revocation: Arc<RevocationService>,
    /// Client storage for authentication.
    pub client_storage: Arc<dyn ClientStorage>,
}

impl OAuthState {
    /// Creates a new state.
    pub fn new(
        introspection: Arc<IntrospectionService>,
        revocation: Arc<RevocationService>,
        client_storage: Arc<dyn ClientStorage>,
    ) -> Self {
        Self {
            introspection,
            revocation,
            client_storage,
        }
    }
}

/// Router with both token endpoints mounted.
pub fn router(state: OAuthState) -> Router {
    Router::new()
        .route(INTROSPECT_PATH, post(introspect_handler))
        .route(REVOKE_PATH, post(revoke_handler))
        .with_state(state)
}

// =============================================================================
// Request Types
// =============================================================================

/// Form parameters accepted by both endpoints.
///
/// `token` is optional at the extractor level so that each handler decides
/// when a missing token is reported relative to client authentication.
#[derive(Debug, Default, Deserialize)]
pub struct TokenForm {
    /// The token to introspect or revoke.
    #[serde(default)]
    pub token: Option<String>,

    /// Optional hint about the token type.
    #[serde(default)]
    pub token_type_hint: Option<String>,

    /// Client ID (for public clients or when not using Basic auth).
    #[serde(default)]
    pub client_id: Option<String>,

    /// Client secret (for client_secret_post authentication).
    #[serde(default)]
    pub client_secret: Option<String>,
}

impl TokenForm {
    /// The token, if present and non-empty.
    fn token(&self) -> Result<&str, OAuthErrorResponse> {
        self.token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| OAuthErrorResponse::invalid_request("Missing required 'token' parameter"))
    }

    /// The parsed hint; unrecognized values count as absent.
    fn hint(&self) -> Option<TokenTypeHint> {
        self.token_type_hint
            .as_deref()
            .and_then(parse_token_type_hint)
    }

    fn credentials<'a>(&'a self, headers: &'a HeaderMap) -> ClientCredentials<'a> {
        ClientCredentials {
            authorization: headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok()),
            client_id: self.client_id.as_deref(),
            client_secret: self.client_secret.as_deref(),
        }
    }
}

/// Maps a form extraction failure to an OAuth error.
///
/// A wrong content type is `415`; anything else about the body is
/// `invalid_request`.
fn form_rejection(rejection: FormRejection) -> OAuthErrorResponse {
    match rejection {
        FormRejection::InvalidFormContentType(_) => OAuthErrorResponse::unsupported_media_type(),
        other if other.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            OAuthErrorResponse::invalid_request("Request body too large")
                .with_status(StatusCode::PAYLOAD_TOO_LARGE)
        }
        other => {
            tracing::debug!(error = %other, "Rejected token endpoint form body");
            OAuthErrorResponse::invalid_request("Malformed form body")
        }
    }
}

/// Extract [`AuditSource`] from HTTP headers.
///
/// The client IP is taken from the first `X-Forwarded-For` hop, then
/// `X-Real-IP`.
#[must_use]
pub fn extract_audit_source(headers: &HeaderMap) -> AuditSource {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .and_then(|s| s.trim().parse().ok());

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    AuditSource {
        ip_address,
        user_agent,
    }
}
