//! Issued token storage.
//!
//! Token rows are written by the issuing service; here they are only read,
//! except for the refresh-token revocation which runs as one transaction.

use std::collections::HashSet;

use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use tokenward_auth::storage::RefreshRevocation;
use tokenward_auth::types::{
    AccessTokenRecord, BlacklistEntry, RefreshTokenRecord, TokenType, blacklist_key,
};

use crate::revoked_token::upsert_entries;
use crate::{PgPool, StorageResult};

type AccessTokenTuple = (
    Uuid,
    String,
    Option<String>,
    String,
    Option<String>,
    String,
    OffsetDateTime,
    OffsetDateTime,
);

type RefreshTokenTuple = (
    Uuid,
    String,
    Option<String>,
    String,
    Option<String>,
    String,
    OffsetDateTime,
    bool,
    Option<OffsetDateTime>,
    OffsetDateTime,
);

const ACCESS_COLUMNS: &str =
    "id, token_hash, jti, client_id, user_id, scope, expires_at, created_at";

const REFRESH_COLUMNS: &str = "id, token_hash, jti, client_id, user_id, scope, expires_at, \
     is_revoked, revoked_at, created_at";

fn access_from_tuple(row: AccessTokenTuple) -> AccessTokenRecord {
    let (id, token_hash, jti, client_id, user_id, scope, expires_at, created_at) = row;
    AccessTokenRecord {
        id,
        token_hash,
        jti,
        client_id,
        user_id,
        scope,
        expires_at,
        created_at,
    }
}

fn refresh_from_tuple(row: RefreshTokenTuple) -> RefreshTokenRecord {
    let (
        id,
        token_hash,
        jti,
        client_id,
        user_id,
        scope,
        expires_at,
        is_revoked,
        revoked_at,
        created_at,
    ) = row;
    RefreshTokenRecord {
        id,
        token_hash,
        jti,
        client_id,
        user_id,
        scope,
        expires_at,
        is_revoked,
        revoked_at,
        created_at,
    }
}

/// Builds the cascade batch: the refresh token's own entry first, then one
/// entry per live access token, skipping keys already present.
fn cascade_entries(
    revocation: &RefreshRevocation,
    access_rows: Vec<(Uuid, Option<String>, OffsetDateTime)>,
) -> (Vec<BlacklistEntry>, u64) {
    let mut seen = HashSet::with_capacity(access_rows.len() + 1);
    let mut entries = Vec::with_capacity(access_rows.len() + 1);

    seen.insert(revocation.blacklist_key.clone());
    entries.push(BlacklistEntry::new(
        revocation.blacklist_key.clone(),
        TokenType::RefreshToken,
        revocation.expires_at,
    ));

    let mut cascaded = 0u64;
    for (id, jti, expires_at) in access_rows {
        let key = blacklist_key(TokenType::AccessToken, jti.as_deref(), id);
        if seen.insert(key.clone()) {
            entries.push(BlacklistEntry::new(key, TokenType::AccessToken, expires_at));
            cascaded += 1;
        }
    }

    (entries, cascaded)
}

/// Token storage operations.
pub struct TokenStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> TokenStorage<'a> {
    /// Create a new token storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find an access token by hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_access_token(
        &self,
        token_hash: &str,
    ) -> StorageResult<Option<AccessTokenRecord>> {
        let row: Option<AccessTokenTuple> = query_as(&format!(
            "SELECT {ACCESS_COLUMNS} FROM access_tokens WHERE token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(access_from_tuple))
    }

    /// Find an access token by hash, scoped to the owning client.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_access_token_for_client(
        &self,
        token_hash: &str,
        client_id: &str,
    ) -> StorageResult<Option<AccessTokenRecord>> {
        let row: Option<AccessTokenTuple> = query_as(&format!(
            "SELECT {ACCESS_COLUMNS} FROM access_tokens WHERE token_hash = $1 AND client_id = $2"
        ))
        .bind(token_hash)
        .bind(client_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(access_from_tuple))
    }

    /// Find a refresh token by hash, revoked or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> StorageResult<Option<RefreshTokenRecord>> {
        let row: Option<RefreshTokenTuple> = query_as(&format!(
            "SELECT {REFRESH_COLUMNS} FROM refresh_tokens WHERE token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(refresh_from_tuple))
    }

    /// Find an unrevoked refresh token by hash, scoped to the owning client.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_active_refresh_token_for_client(
        &self,
        token_hash: &str,
        client_id: &str,
    ) -> StorageResult<Option<RefreshTokenRecord>> {
        let row: Option<RefreshTokenTuple> = query_as(&format!(
            "SELECT {REFRESH_COLUMNS} FROM refresh_tokens \
             WHERE token_hash = $1 AND client_id = $2 AND is_revoked = FALSE"
        ))
        .bind(token_hash)
        .bind(client_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(refresh_from_tuple))
    }

    /// Revoke a refresh token and denylist every live access token of the
    /// same grant, in one transaction.
    ///
    /// A token that another request revoked first yields `Ok(0)` with no
    /// writes.
    ///
    /// # Returns
    ///
    /// Returns the number of access tokens added to the denylist.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; the transaction is rolled back.
    pub async fn revoke_refresh_token(&self, revocation: &RefreshRevocation) -> StorageResult<u64> {
        let mut tx = self.pool.begin().await?;

        let flipped = query(
            r#"
            UPDATE refresh_tokens
            SET is_revoked = TRUE, revoked_at = $2
            WHERE id = $1 AND is_revoked = FALSE
            "#,
        )
        .bind(revocation.token_id)
        .bind(revocation.revoked_at)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if flipped == 0 {
            debug!(token_id = %revocation.token_id, "Refresh token already revoked");
            tx.rollback().await?;
            return Ok(0);
        }

        let access_rows: Vec<(Uuid, Option<String>, OffsetDateTime)> = query_as(
            r#"
            SELECT id, jti, expires_at
            FROM access_tokens
            WHERE client_id = $1
              AND user_id IS NOT DISTINCT FROM $2
              AND expires_at > $3
            "#,
        )
        .bind(&revocation.client_id)
        .bind(revocation.user_id.as_deref())
        .bind(revocation.revoked_at)
        .fetch_all(&mut *tx)
        .await?;

        let (entries, cascaded) = cascade_entries(revocation, access_rows);
        upsert_entries(&mut tx, &entries).await?;

        tx.commit().await?;

        Ok(cascaded)
    }
}
