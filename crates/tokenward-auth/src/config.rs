//! Token authority configuration.
//!
//! Access and refresh tokens carry separate signing material so that a
//! refresh token can never verify as an access token (and vice versa).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::token::jwt::SigningAlgorithm;

/// Minimum length in bytes for HMAC secrets.
pub const MIN_HMAC_SECRET_LEN: usize = 32;

/// Root configuration for the token authority.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// issuer = "https://auth.example.com"
/// audience = "https://api.example.com"
/// leeway_seconds = 30
/// blacklist_purge_interval = "15m"
///
/// [auth.access_token]
/// algorithm = "HS256"
/// secret = "..."
///
/// [auth.refresh_token]
/// algorithm = "RS256"
/// public_key_pem = "-----BEGIN PUBLIC KEY-----..."
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Expected `iss` claim.
    pub issuer: String,

    /// Expected `aud` claim. Audience is not checked when unset.
    pub audience: Option<String>,

    /// Signing material for access tokens.
    pub access_token: TokenSigningConfig,

    /// Signing material for refresh tokens.
    pub refresh_token: TokenSigningConfig,

    /// Clock skew tolerated on `exp`, in seconds.
    pub leeway_seconds: u64,

    /// How often expired blacklist entries are purged.
    #[serde(with = "humantime_serde")]
    pub blacklist_purge_interval: Duration,

    /// Audit configuration.
    pub audit: AuditConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            audience: None,
            access_token: TokenSigningConfig::default(),
            refresh_token: TokenSigningConfig::default(),
            leeway_seconds: 30,
            blacklist_purge_interval: Duration::from_secs(15 * 60),
            audit: AuditConfig::default(),
        }
    }
}

/// Signing material for one token kind.
///
/// HMAC algorithms read `secret`; RSA and EC algorithms read the PEM fields.
/// Only the public key is needed to verify; the private key is accepted so
/// that tooling sharing this config can mint tokens.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenSigningConfig {
    /// Signing algorithm.
    /// Supported: "HS256", "HS384", "HS512", "RS256", "RS384", "ES384"
    pub algorithm: String,

    /// Shared secret for HMAC algorithms.
    #[serde(skip_serializing)]
    pub secret: Option<String>,

    /// PEM-encoded public key for RSA/EC algorithms.
    pub public_key_pem: Option<String>,

    /// PEM-encoded private key for RSA/EC algorithms.
    #[serde(skip_serializing)]
    pub private_key_pem: Option<String>,
}

impl Default for TokenSigningConfig {
    fn default() -> Self {
        Self {
            algorithm: "HS256".to_string(),
            secret: None,
            public_key_pem: None,
            private_key_pem: None,
        }
    }
}

impl TokenSigningConfig {
    /// HMAC config from a shared secret.
    #[must_use]
    pub fn hmac(algorithm: &str, secret: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.to_string(),
            secret: Some(secret.into()),
            ..Self::default()
        }
    }

    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        let algorithm: SigningAlgorithm = self.algorithm.parse().map_err(|_| {
            ConfigError::InvalidValue(format!(
                "Invalid signing algorithm for {}: '{}'. Must be HS256, HS384, HS512, RS256, RS384, or ES384",
                section, self.algorithm
            ))
        })?;

        if algorithm.is_hmac() {
            match self.secret.as_deref() {
                None | Some("") => {
                    return Err(ConfigError::Missing(format!("{}.secret", section)));
                }
                Some(secret) if secret.len() < MIN_HMAC_SECRET_LEN => {
                    return Err(ConfigError::InvalidValue(format!(
                        "{}.secret must be at least {} bytes",
                        section, MIN_HMAC_SECRET_LEN
                    )));
                }
                Some(_) => {}
            }
        } else if self
            .public_key_pem
            .as_deref()
            .is_none_or(|pem| pem.trim().is_empty())
        {
            return Err(ConfigError::Missing(format!("{}.public_key_pem", section)));
        }

        Ok(())
    }
}

/// Audit configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Emit audit events at all.
    pub enabled: bool,

    /// Record revocation attempts.
    pub log_token_operations: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_token_operations: true,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the issuer is empty, an algorithm is unknown,
    /// signing material is missing or too short, or access and refresh
    /// tokens share an HMAC secret.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::InvalidValue(
                "issuer cannot be empty".to_string(),
            ));
        }

        if let Some(audience) = &self.audience
            && audience.is_empty()
        {
            return Err(ConfigError::InvalidValue(
                "audience cannot be empty when set".to_string(),
            ));
        }

        self.access_token.validate("access_token")?;
        self.refresh_token.validate("refresh_token")?;

        if let (Some(access), Some(refresh)) =
            (&self.access_token.secret, &self.refresh_token.secret)
            && access == refresh
        {
            return Err(ConfigError::InvalidValue(
                "access_token and refresh_token must not share a secret".to_string(),
            ));
        }

        if self.blacklist_purge_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "blacklist_purge_interval must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
