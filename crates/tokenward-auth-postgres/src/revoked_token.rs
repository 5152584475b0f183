//! Revocation denylist storage for PostgreSQL.
//!
//! One row per key in `token_blacklist`, enforced by the primary key on
//! `jti`. Writes are `INSERT ... ON CONFLICT (jti) DO UPDATE`, so repeating a
//! revocation only refreshes the stored expiry.

use std::collections::HashMap;

use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgConnection;
use time::OffsetDateTime;

use tokenward_auth::types::{BlacklistEntry, TokenType};

use crate::{PgPool, StorageError, StorageResult};

/// Upserts `entries` as one statement on `conn`.
///
/// Duplicate keys within the batch collapse to the last occurrence, since
/// Postgres rejects a batch that touches the same conflict row twice.
///
/// # Errors
///
/// Returns an error if the statement fails.
pub(crate) async fn upsert_entries(
    conn: &mut PgConnection,
    entries: &[BlacklistEntry],
) -> StorageResult<u64> {
    if entries.is_empty() {
        return Ok(0);
    }

    let mut position: HashMap<&str, usize> = HashMap::with_capacity(entries.len());
    let mut jtis: Vec<String> = Vec::with_capacity(entries.len());
    let mut token_types: Vec<String> = Vec::with_capacity(entries.len());
    let mut expires: Vec<OffsetDateTime> = Vec::with_capacity(entries.len());

    for entry in entries {
        match position.get(entry.jti.as_str()) {
            Some(&i) => {
                token_types[i] = entry.token_type.as_str().to_string();
                expires[i] = entry.expires_at;
            }
            None => {
                position.insert(entry.jti.as_str(), jtis.len());
                jtis.push(entry.jti.clone());
                token_types.push(entry.token_type.as_str().to_string());
                expires.push(entry.expires_at);
            }
        }
    }

    let result = query(
        r#"
        INSERT INTO token_blacklist (jti, token_type, expires_at)
        SELECT * FROM UNNEST($1::text[], $2::text[], $3::timestamptz[])
        ON CONFLICT (jti) DO UPDATE
        SET token_type = EXCLUDED.token_type,
            expires_at = EXCLUDED.expires_at
        "#,
    )
    .bind(&jtis)
    .bind(&token_types)
    .bind(&expires)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

/// Revocation denylist operations.
pub struct RevokedTokenStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> RevokedTokenStorage<'a> {
    /// Create a new revoked token storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert or refresh a denylist entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub async fn upsert(&self, entry: &BlacklistEntry) -> StorageResult<()> {
        let mut conn = self.pool.acquire().await?;
        upsert_entries(&mut conn, std::slice::from_ref(entry)).await?;
        Ok(())
    }

    /// Check if a key is on the denylist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn is_revoked(&self, jti: &str) -> StorageResult<bool> {
        let exists: bool =
            query_scalar("SELECT EXISTS(SELECT 1 FROM token_blacklist WHERE jti = $1)")
                .bind(jti)
                .fetch_one(self.pool)
                .await?;

        Ok(exists)
    }

    /// Fetch a single entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or the row is malformed.
    pub async fn find(&self, jti: &str) -> StorageResult<Option<BlacklistEntry>> {
        let row: Option<(String, String, OffsetDateTime)> = query_as(
            "SELECT jti, token_type, expires_at FROM token_blacklist WHERE jti = $1",
        )
        .bind(jti)
        .fetch_optional(self.pool)
        .await?;

        row.map(|(jti, token_type, expires_at)| {
            let token_type = TokenType::parse(&token_type).ok_or_else(|| {
                StorageError::invalid_data(format!("Unknown token_type '{}'", token_type))
            })?;
            Ok(BlacklistEntry::new(jti, token_type, expires_at))
        })
        .transpose()
    }

    /// Delete entries whose `expires_at` is at or before `now`.
    ///
    /// # Returns
    ///
    /// Returns the number of entries deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn purge_expired(&self, now: OffsetDateTime) -> StorageResult<u64> {
        let result = query("DELETE FROM token_blacklist WHERE expires_at <= $1")
            .bind(now)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Number of entries on the denylist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count(&self) -> StorageResult<i64> {
        let count: i64 = query_scalar("SELECT COUNT(*) FROM token_blacklist")
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }
}
