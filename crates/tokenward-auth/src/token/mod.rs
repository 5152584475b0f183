//! Token verification, introspection and revocation.
//!
//! This module provides:
//!
//! - JWT encoding and decoding with per-kind signing keys
//! - Token verification and lookup hashing
//! - Token introspection (RFC 7662)
//! - Token revocation (RFC 7009)

pub mod introspection;
pub mod jwt;
pub mod revocation;
pub mod verifier;

#[cfg(test)]
pub(crate) mod fixtures;

pub use introspection::{IntrospectionRequest, IntrospectionResponse, IntrospectionService};
pub use jwt::{Audience, JwtError, JwtService, SigningAlgorithm, SigningKey, TokenClaims};
pub use revocation::{
    RevocationOutcome, RevocationRequest, RevocationService, TokenTypeHint,
    parse_token_type_hint,
};
pub use verifier::{TokenVerifier, Verification, hash_token};
