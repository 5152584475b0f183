//! JWT decoding and signature verification.
//!
//! Tokens reaching this authority were minted elsewhere; this module only
//! needs to check them. Encoding is kept for tests and for tooling that
//! shares the same configuration.
//!
//! ## Supported Algorithms
//!
//! - **HS256/HS384/HS512**: HMAC with a shared secret
//! - **RS256/RS384**: RSA, PEM-encoded keys
//! - **ES384**: ECDSA with P-384, PEM-encoded keys
//!
//! ## Example
//!
//! ```ignore
//! use tokenward_auth::token::jwt::{JwtService, SigningKey, SigningAlgorithm};
//!
//! let key = SigningKey::from_secret(SigningAlgorithm::HS256, secret.as_bytes());
//! let service = JwtService::new(key, "https://auth.example.com");
//!
//! let claims = service.decode(&token, OffsetDateTime::now_utc())?;
//! ```

use std::fmt;
use std::str::FromStr;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::TokenSigningConfig;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    EncodingError {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a token.
    #[error("Failed to decode token: {message}")]
    DecodingError {
        /// Description of the decoding error.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    Expired,

    /// The token signature is invalid.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token claims are invalid.
    #[error("Invalid claims: {message}")]
    InvalidClaims {
        /// Description of why claims are invalid.
        message: String,
    },

    /// Invalid key format or data.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },
}

impl JwtError {
    /// Creates a new `EncodingError`.
    #[must_use]
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    /// Creates a new `DecodingError`.
    #[must_use]
    pub fn decoding_error(message: impl Into<String>) -> Self {
        Self::DecodingError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClaims` error.
    #[must_use]
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a validation error (expired, invalid signature, etc.).
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::Expired | Self::InvalidSignature | Self::InvalidClaims { .. }
        )
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::InvalidToken
            | ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm => Self::decoding_error(err.to_string()),
            ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidSubject
            | ErrorKind::ImmatureSignature
            | ErrorKind::MissingRequiredClaim(_) => Self::invalid_claims(err.to_string()),
            ErrorKind::InvalidRsaKey(_)
            | ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidKeyFormat => Self::invalid_key(err.to_string()),
            _ => Self::decoding_error(err.to_string()),
        }
    }
}

// ============================================================================
// Signing Algorithm
// ============================================================================

/// Supported signing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    /// HMAC with SHA-256.
    HS256,
    /// HMAC with SHA-384.
    HS384,
    /// HMAC with SHA-512.
    HS512,
    /// RSA with SHA-256.
    RS256,
    /// RSA with SHA-384.
    RS384,
    /// ECDSA with P-384.
    ES384,
}

impl SigningAlgorithm {
    /// Converts to the `jsonwebtoken` Algorithm type.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::HS256 => Algorithm::HS256,
            Self::HS384 => Algorithm::HS384,
            Self::HS512 => Algorithm::HS512,
            Self::RS256 => Algorithm::RS256,
            Self::RS384 => Algorithm::RS384,
            Self::ES384 => Algorithm::ES384,
        }
    }

    /// Returns the algorithm name as used in JWT headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::ES384 => "ES384",
        }
    }

    /// Returns `true` if this is an HMAC algorithm.
    #[must_use]
    pub fn is_hmac(&self) -> bool {
        matches!(self, Self::HS256 | Self::HS384 | Self::HS512)
    }

    /// Returns `true` if this is an RSA-based algorithm.
    #[must_use]
    pub fn is_rsa(&self) -> bool {
        matches!(self, Self::RS256 | Self::RS384)
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = JwtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HS256" => Ok(Self::HS256),
            "HS384" => Ok(Self::HS384),
            "HS512" => Ok(Self::HS512),
            "RS256" => Ok(Self::RS256),
            "RS384" => Ok(Self::RS384),
            "ES384" => Ok(Self::ES384),
            other => Err(JwtError::invalid_key(format!(
                "Unsupported algorithm: {}",
                other
            ))),
        }
    }
}

// ============================================================================
// Claims
// ============================================================================

/// The `aud` claim, which JWT allows as a string or an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// A single audience.
    Single(String),
    /// Several audiences.
    Multiple(Vec<String>),
}

impl Audience {
    /// Returns `true` if `value` is one of the audiences.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::Single(aud) => aud == value,
            Self::Multiple(auds) => auds.iter().any(|aud| aud == value),
        }
    }
}

/// Claims carried by access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user id, or client id for client credentials).
    pub sub: String,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Issued at (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Not before (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Audience.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Unique token identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Client the token was issued to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Granted scopes (space-separated).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Human-readable identifier of the resource owner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Application-level permissions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
}

impl TokenClaims {
    /// Creates a builder for token claims.
    #[must_use]
    pub fn builder(sub: impl Into<String>) -> TokenClaimsBuilder {
        TokenClaimsBuilder::new(sub)
    }
}

/// Builder for [`TokenClaims`].
#[derive(Debug)]
pub struct TokenClaimsBuilder {
    claims: TokenClaims,
}

impl TokenClaimsBuilder {
    fn new(sub: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        Self {
            claims: TokenClaims {
                sub: sub.into(),
                exp: now + 3600,
                iat: Some(now),
                nbf: None,
                iss: None,
                aud: None,
                jti: None,
                client_id: None,
                scope: None,
                username: None,
                permissions: None,
            },
        }
    }

    /// Sets the issuer.
    #[must_use]
    pub fn issuer(mut self, iss: impl Into<String>) -> Self {
        self.claims.iss = Some(iss.into());
        self
    }

    /// Sets a single audience.
    #[must_use]
    pub fn audience(mut self, aud: impl Into<String>) -> Self {
        self.claims.aud = Some(Audience::Single(aud.into()));
        self
    }

    /// Sets the token identifier.
    #[must_use]
    pub fn jti(mut self, jti: impl Into<String>) -> Self {
        self.claims.jti = Some(jti.into());
        self
    }

    /// Sets the client id.
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.claims.client_id = Some(client_id.into());
        self
    }

    /// Sets the scope.
    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.claims.scope = Some(scope.into());
        self
    }

    /// Sets the username.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.claims.username = Some(username.into());
        self
    }

    /// Sets the permissions.
    #[must_use]
    pub fn permissions(mut self, permissions: Vec<String>) -> Self {
        self.claims.permissions = Some(permissions);
        self
    }

    /// Sets `iat` and `exp` relative to `issued_at`.
    #[must_use]
    pub fn issued_at(mut self, issued_at: OffsetDateTime, lifetime: time::Duration) -> Self {
        self.claims.iat = Some(issued_at.unix_timestamp());
        self.claims.exp = (issued_at + lifetime).unix_timestamp();
        self
    }

    /// Builds the claims.
    #[must_use]
    pub fn build(self) -> TokenClaims {
        self.claims
    }
}

// ============================================================================
// Signing Key
// ============================================================================

/// Key material for one token kind.
///
/// The encoding half is optional: a verifier holding only a public key can
/// still check signatures.
#[derive(Clone)]
pub struct SigningKey {
    /// Key ID placed in the `kid` header when encoding.
    pub kid: Option<String>,

    /// Signing algorithm.
    pub algorithm: SigningAlgorithm,

    encoding_key: Option<EncodingKey>,

    decoding_key: DecodingKey,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("can_encode", &self.encoding_key.is_some())
            .finish()
    }
}

impl SigningKey {
    /// Creates an HMAC key from a shared secret.
    ///
    /// # Errors
    /// Returns an error if the algorithm is not HMAC-based.
    pub fn from_secret(algorithm: SigningAlgorithm, secret: &[u8]) -> Result<Self, JwtError> {
        if !algorithm.is_hmac() {
            return Err(JwtError::invalid_key(format!(
                "Algorithm {} does not use a shared secret",
                algorithm
            )));
        }

        Ok(Self {
            kid: None,
            algorithm,
            encoding_key: Some(EncodingKey::from_secret(secret)),
            decoding_key: DecodingKey::from_secret(secret),
        })
    }

    /// Creates an RSA or EC key from PEM-encoded material.
    ///
    /// # Errors
    /// Returns an error if the algorithm is HMAC-based or a PEM cannot be parsed.
    pub fn from_pem(
        algorithm: SigningAlgorithm,
        public_pem: &str,
        private_pem: Option<&str>,
    ) -> Result<Self, JwtError> {
        if algorithm.is_hmac() {
            return Err(JwtError::invalid_key(format!(
                "Algorithm {} requires a shared secret",
                algorithm
            )));
        }

        let (decoding_key, encoding_key) = if algorithm.is_rsa() {
            let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
                .map_err(|e| JwtError::invalid_key(e.to_string()))?;
            let encoding_key = private_pem
                .map(|pem| EncodingKey::from_rsa_pem(pem.as_bytes()))
                .transpose()
                .map_err(|e| JwtError::invalid_key(e.to_string()))?;
            (decoding_key, encoding_key)
        } else {
            let decoding_key = DecodingKey::from_ec_pem(public_pem.as_bytes())
                .map_err(|e| JwtError::invalid_key(e.to_string()))?;
            let encoding_key = private_pem
                .map(|pem| EncodingKey::from_ec_pem(pem.as_bytes()))
                .transpose()
                .map_err(|e| JwtError::invalid_key(e.to_string()))?;
            (decoding_key, encoding_key)
        };

        Ok(Self {
            kid: None,
            algorithm,
            encoding_key,
            decoding_key,
        })
    }

    /// Builds a key from configuration.
    ///
    /// # Errors
    /// Returns an error if the algorithm is unknown or key material is missing or unparsable.
    pub fn from_config(config: &TokenSigningConfig) -> Result<Self, JwtError> {
        let algorithm: SigningAlgorithm = config.algorithm.parse()?;

        if algorithm.is_hmac() {
            let secret = config
                .secret
                .as_deref()
                .ok_or_else(|| JwtError::invalid_key("Missing HMAC secret"))?;
            return Self::from_secret(algorithm, secret.as_bytes());
        }

        let public_pem = config
            .public_key_pem
            .as_deref()
            .ok_or_else(|| JwtError::invalid_key("Missing public key PEM"))?;
        Self::from_pem(algorithm, public_pem, config.private_key_pem.as_deref())
    }

    /// Sets the key ID.
    #[must_use]
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }
}

// ============================================================================
// JWT Service
// ============================================================================

/// Signs and verifies tokens of one kind.
///
/// Expiry is checked against the `now` the caller passes in rather than the
/// system clock, so introspection results follow the injected [`crate::clock::Clock`].
#[derive(Debug, Clone)]
pub struct JwtService {
    signing_key: SigningKey,
    issuer: String,
    audience: Option<String>,
    leeway_seconds: i64,
}

impl JwtService {
    /// Creates a new JWT service.
    #[must_use]
    pub fn new(signing_key: SigningKey, issuer: impl Into<String>) -> Self {
        Self {
            signing_key,
            issuer: issuer.into(),
            audience: None,
            leeway_seconds: 0,
        }
    }

    /// Requires the given audience on decode.
    #[must_use]
    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        self.audience = audience;
        self
    }

    /// Tolerated clock skew on `exp` and `nbf`.
    #[must_use]
    pub fn with_leeway(mut self, leeway_seconds: u64) -> Self {
        self.leeway_seconds = i64::try_from(leeway_seconds).unwrap_or(i64::MAX);
        self
    }

    /// Encodes claims into a JWT string.
    ///
    /// # Errors
    /// Returns an error if the key has no private half or encoding fails.
    pub fn encode<T: Serialize>(&self, claims: &T) -> Result<String, JwtError> {
        let encoding_key = self
            .signing_key
            .encoding_key
            .as_ref()
            .ok_or_else(|| JwtError::encoding_error("No private key configured"))?;

        let mut header = Header::new(self.signing_key.algorithm.to_jwt_algorithm());
        header.kid = self.signing_key.kid.clone();

        encode(&header, claims, encoding_key).map_err(|e| JwtError::encoding_error(e.to_string()))
    }

    /// Decodes and validates a JWT string at `now`.
    ///
    /// The signature, issuer and (when configured) audience are checked by
    /// `jsonwebtoken`; `exp` and `nbf` are checked here against `now`.
    ///
    /// # Errors
    /// Returns an error if decoding or any validation fails.
    pub fn decode(&self, token: &str, now: OffsetDateTime) -> Result<TokenClaims, JwtError> {
        let mut validation = Validation::new(self.signing_key.algorithm.to_jwt_algorithm());
        validation.set_issuer(&[&self.issuer]);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let claims = decode::<TokenClaims>(token, &self.signing_key.decoding_key, &validation)
            .map_err(JwtError::from)?
            .claims;

        let now = now.unix_timestamp();
        if now >= claims.exp.saturating_add(self.leeway_seconds) {
            return Err(JwtError::Expired);
        }
        if let Some(nbf) = claims.nbf
            && now < nbf.saturating_sub(self.leeway_seconds)
        {
            return Err(JwtError::invalid_claims("Token not yet valid"));
        }

        Ok(claims)
    }

    /// Returns the issuer URL.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the signing algorithm.
    #[must_use]
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.signing_key.algorithm
    }
}

// ============================================================================
// Tests
// ============================================================================
