//! Token verification and lookup hashing.
//!
//! Verification never fails with an error: any token that cannot be decoded,
//! carries a bad signature, is expired, or was signed with the other token
//! kind's key comes back as [`Verification::Invalid`].

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::jwt::{JwtError, JwtService, SigningKey, TokenClaims};
use crate::clock::Clock;
use crate::config::{AuthConfig, TokenSigningConfig};
use crate::error::AuthError;
use crate::AuthResult;

/// Length of the hash prefix that may appear in logs and audit metadata.
pub const HASH_PREFIX_LEN: usize = 12;

/// Outcome of verifying a token.
#[derive(Debug)]
pub enum Verification {
    /// Signature and claims check out.
    Valid(TokenClaims),
    /// The token is not usable; the reason is for logs only.
    Invalid(JwtError),
}

impl Verification {
    /// Returns `true` for [`Verification::Valid`].
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }
}

/// Hash a token value using SHA-256.
///
/// This is the store lookup key: rows hold the digest, never the token.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// The loggable prefix of a token hash.
#[must_use]
pub fn hash_prefix(hash: &str) -> &str {
    hash.get(..HASH_PREFIX_LEN).unwrap_or(hash)
}

/// Reads the `jti` claim without verifying the signature.
///
/// Revocation uses this only to pick a denylist key; whether the token is
/// revoked at all is decided by a hash lookup scoped to the calling client.
#[must_use]
pub fn peek_jti(token: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct MinimalClaims {
        #[serde(default)]
        jti: Option<String>,
    }

    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };

    let payload_bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: MinimalClaims = serde_json::from_slice(&payload_bytes).ok()?;
    claims.jti.filter(|jti| !jti.is_empty())
}

/// Verifies access and refresh tokens against their own keys.
pub struct TokenVerifier {
    access: JwtService,
    refresh: JwtService,
    clock: Arc<dyn Clock>,
}

impl TokenVerifier {
    /// Creates a verifier from two configured JWT services.
    #[must_use]
    pub fn new(access: JwtService, refresh: JwtService, clock: Arc<dyn Clock>) -> Self {
        Self {
            access,
            refresh,
            clock,
        }
    }

    /// Builds a verifier from configuration.
    ///
    /// # Errors
    /// Returns a configuration error if either key cannot be loaded.
    pub fn from_config(config: &AuthConfig, clock: Arc<dyn Clock>) -> AuthResult<Self> {
        let build = |section: &str, signing: &TokenSigningConfig| -> AuthResult<JwtService> {
            let key = SigningKey::from_config(signing)
                .map_err(|e| AuthError::configuration(format!("{}: {}", section, e)))?;
            Ok(JwtService::new(key, config.issuer.clone())
                .with_audience(config.audience.clone())
                .with_leeway(config.leeway_seconds))
        };

        Ok(Self::new(
            build("access_token", &config.access_token)?,
            build("refresh_token", &config.refresh_token)?,
            clock,
        ))
    }

    /// Verifies `raw` as an access token.
    #[must_use]
    pub fn verify_access_token(&self, raw: &str) -> Verification {
        Self::verify(&self.access, raw, self.clock.as_ref())
    }

    /// Verifies `raw` as a refresh token.
    #[must_use]
    pub fn verify_refresh_token(&self, raw: &str) -> Verification {
        Self::verify(&self.refresh, raw, self.clock.as_ref())
    }

    /// Computes the store lookup hash of `raw`.
    #[must_use]
    pub fn token_hash(&self, raw: &str) -> String {
        hash_token(raw)
    }

    /// The JWT service for access tokens.
    #[must_use]
    pub fn access(&self) -> &JwtService {
        &self.access
    }

    /// The JWT service for refresh tokens.
    #[must_use]
    pub fn refresh(&self) -> &JwtService {
        &self.refresh
    }

    fn verify(service: &JwtService, raw: &str, clock: &dyn Clock) -> Verification {
        match service.decode(raw, clock.now()) {
            Ok(claims) => Verification::Valid(claims),
            Err(err) => Verification::Invalid(err),
        }
    }
}
