//! # tokenward-auth
//!
//! OAuth 2.0 token introspection (RFC 7662) and revocation (RFC 7009).
//!
//! This crate provides:
//! - Verification of signed access and refresh tokens
//! - Client authentication for confidential and public clients
//! - A revocation denylist that dominates token store state
//! - Atomic cascading revocation of refresh tokens
//! - Audit events for revocation attempts
//!
//! ## Modules
//!
//! - [`config`] - Signing keys, issuer and audit configuration
//! - [`oauth`] - Client authentication and OAuth error responses
//! - [`token`] - Verification, introspection and revocation
//! - [`storage`] - Storage traits and the in-memory backend
//! - [`audit`] - Audit events and sinks
//! - [`clock`] - Time source for expiry checks
//! - [`http`] - Axum HTTP handlers for the token endpoints

pub mod audit;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod storage;
pub mod token;
pub mod types;

pub use audit::{AuditAction, AuditEvent, AuditSink, AuditSource, NoopAuditSink, TracingAuditSink};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use http::{OAuthState, extract_audit_source, introspect_handler, revoke_handler};
pub use oauth::{OAuthErrorCode, OAuthErrorResponse};
pub use storage::{
    ClientStorage, MemoryStore, RevokedTokenStorage, StorageHealth, TokenStorage,
};
pub use token::{IntrospectionService, RevocationService, TokenVerifier};
pub use types::{AccessTokenRecord, BlacklistEntry, Client, ClientType, RefreshTokenRecord, TokenType};

/// Type alias for token authority results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use tokenward_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::audit::{AuditSink, AuditSource};
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::config::{AuthConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::http::{OAuthState, introspect_handler, revoke_handler};
    pub use crate::storage::{ClientStorage, RevokedTokenStorage, StorageHealth, TokenStorage};
    pub use crate::token::{
        IntrospectionRequest, IntrospectionResponse, IntrospectionService, RevocationRequest,
        RevocationService, TokenVerifier,
    };
    pub use crate::types::{Client, ClientType, TokenType};
}
