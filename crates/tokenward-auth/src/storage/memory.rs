//! In-process storage backend.
//!
//! Every table lives behind one `RwLock`, so a refresh-token cascade is a
//! single critical section. Writes are staged and only applied once every
//! step has succeeded.
//!
//! Two knobs exist for exercising failure paths:
//!
//! - [`MemoryStore::with_blacklist_capacity`] caps the denylist; an upsert
//!   that would exceed it fails with a storage error
//! - [`MemoryStore::set_unavailable`] makes every call fail as if the
//!   database were unreachable

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use time::OffsetDateTime;

use super::{
    ClientStorage, RefreshRevocation, RevokedTokenStorage, StorageHealth, TokenStorage,
};
use crate::AuthResult;
use crate::error::AuthError;
use crate::types::{AccessTokenRecord, BlacklistEntry, Client, RefreshTokenRecord, TokenType};

#[derive(Debug, Default)]
struct Tables {
    clients: HashMap<String, Client>,
    access_tokens: HashMap<String, AccessTokenRecord>,
    refresh_tokens: HashMap<String, RefreshTokenRecord>,
    blacklist: HashMap<String, BlacklistEntry>,
}

/// In-memory implementation of every storage trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    blacklist_capacity: Option<usize>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of denylist entries.
    #[must_use]
    pub fn with_blacklist_capacity(mut self, capacity: usize) -> Self {
        self.blacklist_capacity = Some(capacity);
        self
    }

    /// Makes every subsequent call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Registers or replaces a client.
    pub fn insert_client(&self, client: Client) -> AuthResult<()> {
        self.write()?.clients.insert(client.client_id.clone(), client);
        Ok(())
    }

    /// Stores an issued access token.
    pub fn insert_access_token(&self, token: AccessTokenRecord) -> AuthResult<()> {
        self.write()?
            .access_tokens
            .insert(token.token_hash.clone(), token);
        Ok(())
    }

    /// Stores an issued refresh token.
    pub fn insert_refresh_token(&self, token: RefreshTokenRecord) -> AuthResult<()> {
        self.write()?
            .refresh_tokens
            .insert(token.token_hash.clone(), token);
        Ok(())
    }

    /// Number of denylist entries.
    pub fn blacklist_len(&self) -> AuthResult<usize> {
        Ok(self.read()?.blacklist.len())
    }

    fn check_available(&self) -> AuthResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AuthError::storage("Memory store is unavailable"));
        }
        Ok(())
    }

    fn read(&self) -> AuthResult<RwLockReadGuard<'_, Tables>> {
        self.check_available()?;
        self.tables
            .read()
            .map_err(|_| AuthError::storage("Memory store lock poisoned"))
    }

    fn write(&self) -> AuthResult<RwLockWriteGuard<'_, Tables>> {
        self.check_available()?;
        self.tables
            .write()
            .map_err(|_| AuthError::storage("Memory store lock poisoned"))
    }

    /// Stages denylist upserts against `blacklist`, failing on the first
    /// entry that would exceed capacity.
    fn stage_upserts(
        &self,
        blacklist: &HashMap<String, BlacklistEntry>,
        entries: Vec<BlacklistEntry>,
    ) -> AuthResult<Vec<BlacklistEntry>> {
        let mut staged: Vec<BlacklistEntry> = Vec::with_capacity(entries.len());
        let mut new_keys = 0usize;

        for entry in entries {
            let already_listed = blacklist.contains_key(&entry.jti)
                || staged.iter().any(|s| s.jti == entry.jti);
            if !already_listed {
                new_keys += 1;
                if let Some(capacity) = self.blacklist_capacity
                    && blacklist.len() + new_keys > capacity
                {
                    return Err(AuthError::storage(format!(
                        "Blacklist capacity of {} entries exceeded",
                        capacity
                    )));
                }
            }
            staged.push(entry);
        }

        Ok(staged)
    }
}

#[async_trait]
impl ClientStorage for MemoryStore {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
        Ok(self.read()?.clients.get(client_id).cloned())
    }
}

#[async_trait]
impl TokenStorage for MemoryStore {
    async fn find_access_token(&self, token_hash: &str) -> AuthResult<Option<AccessTokenRecord>> {
        Ok(self.read()?.access_tokens.get(token_hash).cloned())
    }

    async fn find_access_token_for_client(
        &self,
        token_hash: &str,
        client_id: &str,
    ) -> AuthResult<Option<AccessTokenRecord>> {
        Ok(self
            .read()?
            .access_tokens
            .get(token_hash)
            .filter(|t| t.client_id == client_id)
            .cloned())
    }

    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> AuthResult<Option<RefreshTokenRecord>> {
        Ok(self.read()?.refresh_tokens.get(token_hash).cloned())
    }

    async fn find_active_refresh_token_for_client(
        &self,
        token_hash: &str,
        client_id: &str,
    ) -> AuthResult<Option<RefreshTokenRecord>> {
        Ok(self
            .read()?
            .refresh_tokens
            .get(token_hash)
            .filter(|t| t.client_id == client_id && !t.is_revoked)
            .cloned())
    }

    async fn revoke_refresh_token(&self, revocation: &RefreshRevocation) -> AuthResult<u64> {
        let mut tables = self.write()?;

        let (refresh_hash, already_revoked) = tables
            .refresh_tokens
            .iter()
            .find(|(_, t)| t.id == revocation.token_id)
            .map(|(hash, t)| (hash.clone(), t.is_revoked))
            .ok_or_else(|| {
                AuthError::storage(format!(
                    "Refresh token {} disappeared during revocation",
                    revocation.token_id
                ))
            })?;
        // lost a race with another revocation
        if already_revoked {
            return Ok(0);
        }

        let cascade: Vec<BlacklistEntry> = tables
            .access_tokens
            .values()
            .filter(|t| {
                t.client_id == revocation.client_id
                    && t.user_id == revocation.user_id
                    && t.expires_at > revocation.revoked_at
            })
            .map(|t| BlacklistEntry::new(t.blacklist_key(), TokenType::AccessToken, t.expires_at))
            .collect();
        let cascaded = cascade.len() as u64;

        let mut entries = Vec::with_capacity(cascade.len() + 1);
        entries.push(BlacklistEntry::new(
            revocation.blacklist_key.clone(),
            TokenType::RefreshToken,
            revocation.expires_at,
        ));
        entries.extend(cascade);

        // Nothing below may fail.
        let staged = self.stage_upserts(&tables.blacklist, entries)?;

        if let Some(token) = tables.refresh_tokens.get_mut(&refresh_hash) {
            token.is_revoked = true;
            token.revoked_at = Some(revocation.revoked_at);
        }
        for entry in staged {
            tables.blacklist.insert(entry.jti.clone(), entry);
        }

        Ok(cascaded)
    }
}

#[async_trait]
impl RevokedTokenStorage for MemoryStore {
    async fn upsert(&self, entry: &BlacklistEntry) -> AuthResult<()> {
        let mut tables = self.write()?;
        let staged = self.stage_upserts(&tables.blacklist, vec![entry.clone()])?;
        for entry in staged {
            tables.blacklist.insert(entry.jti.clone(), entry);
        }
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> AuthResult<bool> {
        Ok(self.read()?.blacklist.contains_key(jti))
    }

    async fn find(&self, jti: &str) -> AuthResult<Option<BlacklistEntry>> {
        Ok(self.read()?.blacklist.get(jti).cloned())
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> AuthResult<u64> {
        let mut tables = self.write()?;
        let before = tables.blacklist.len();
        tables.blacklist.retain(|_, entry| !entry.is_purgeable_at(now));
        Ok((before - tables.blacklist.len()) as u64)
    }
}

#[async_trait]
impl StorageHealth for MemoryStore {
    async fn ping(&self) -> AuthResult<()> {
        self.check_available()
    }
}
