//! Storage traits for token authority data.
//!
//! This module defines storage interfaces for:
//!
//! - OAuth client registrations
//! - Issued access and refresh tokens
//! - The revocation denylist
//!
//! # Implementations
//!
//! - [`MemoryStore`] - in-process backend for tests and development
//! - `tokenward-auth-postgres` - PostgreSQL storage backend

pub mod client;
pub mod memory;
pub mod revoked_token;
pub mod token;

use async_trait::async_trait;

pub use client::ClientStorage;
pub use memory::MemoryStore;
pub use revoked_token::RevokedTokenStorage;
pub use token::{RefreshRevocation, TokenStorage};

use crate::AuthResult;

/// Liveness probe for a storage backend.
#[async_trait]
pub trait StorageHealth: Send + Sync {
    /// Returns `Ok(())` if the backend can serve requests.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the backend is unreachable.
    async fn ping(&self) -> AuthResult<()>;
}
