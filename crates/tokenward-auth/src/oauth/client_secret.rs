//! Client secret generation, hashing and verification.
//!
//! Secrets are stored as Argon2id PHC strings. Verification goes through
//! `argon2`'s `verify_password`, which compares digests in constant time.
//!
//! # Example
//!
//! ```
//! use tokenward_auth::oauth::client_secret::{
//!     generate_client_secret, hash_client_secret, verify_client_secret,
//! };
//!
//! let secret = generate_client_secret();
//! let hash = hash_client_secret(&secret).unwrap();
//!
//! assert!(verify_client_secret(&secret, &hash).unwrap());
//! assert!(!verify_client_secret("wrong", &hash).unwrap());
//! ```

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;

/// Prefix that makes leaked secrets easy to spot in scanners.
pub const CLIENT_SECRET_PREFIX: &str = "tws_";

/// Generate a new client secret.
///
/// `tws_{64 hex characters}`: 256 random bits.
#[must_use]
pub fn generate_client_secret() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    format!("{}{}", CLIENT_SECRET_PREFIX, hex::encode(bytes))
}

/// Hash a client secret for storage using Argon2id with a random salt.
///
/// # Errors
///
/// Returns `argon2::password_hash::Error` if hashing fails.
pub fn hash_client_secret(secret: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(secret.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a client secret against a stored Argon2 hash.
///
/// Returns `Ok(false)` on mismatch.
///
/// # Errors
///
/// Returns `Err` only if the stored hash is not a valid PHC string.
pub fn verify_client_secret(secret: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    let result = Argon2::default().verify_password(secret.as_bytes(), &parsed_hash);
    Ok(result.is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_client_secret_format() {
        let secret = generate_client_secret();
        assert!(secret.starts_with(CLIENT_SECRET_PREFIX));
        assert_eq!(secret.len(), CLIENT_SECRET_PREFIX.len() + 64);
        assert_ne!(secret, generate_client_secret());
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_client_secret("s3cret").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_client_secret("s3cret", &hash).unwrap());
        assert!(!verify_client_secret("s3cret ", &hash).unwrap());
    }

    #[test]
    fn test_same_secret_different_hashes() {
        let a = hash_client_secret("s3cret").unwrap();
        let b = hash_client_secret("s3cret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_invalid_hash_is_error() {
        assert!(verify_client_secret("s3cret", "not-a-phc-string").is_err());
    }
}
