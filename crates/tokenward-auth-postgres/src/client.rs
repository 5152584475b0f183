//! OAuth client storage.
//!
//! Clients are registered out of band; this crate reads them and offers an
//! upsert for provisioning scripts and tests.

use sqlx_core::query::query;
use sqlx_core::query_as::query_as;

use tokenward_auth::types::{Client, ClientType};

use crate::{PgPool, StorageError, StorageResult};

type ClientTuple = (String, Option<String>, String, bool);

fn client_from_tuple(row: ClientTuple) -> StorageResult<Client> {
    let (client_id, secret_hash, client_type, is_active) = row;
    let client_type = ClientType::parse(&client_type).ok_or_else(|| {
        StorageError::invalid_data(format!(
            "Client '{}' has unknown client_type '{}'",
            client_id, client_type
        ))
    })?;

    Ok(Client {
        client_id,
        secret_hash,
        client_type,
        is_active,
    })
}

/// Client storage operations.
pub struct ClientStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> ClientStorage<'a> {
    /// Create a new client storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Find a client by its OAuth client_id.
    ///
    /// Inactive clients are returned; the caller decides what to do with them.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or the row is malformed.
    pub async fn find_by_client_id(&self, client_id: &str) -> StorageResult<Option<Client>> {
        let row: Option<ClientTuple> = query_as(
            r#"
            SELECT client_id, secret_hash, client_type, is_active
            FROM oauth_clients
            WHERE client_id = $1
            "#,
        )
        .bind(client_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(client_from_tuple).transpose()
    }

    /// Insert or replace a client registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub async fn upsert(&self, client: &Client) -> StorageResult<()> {
        query(
            r#"
            INSERT INTO oauth_clients (client_id, secret_hash, client_type, is_active)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (client_id) DO UPDATE
            SET secret_hash = EXCLUDED.secret_hash,
                client_type = EXCLUDED.client_type,
                is_active = EXCLUDED.is_active
            "#,
        )
        .bind(&client.client_id)
        .bind(&client.secret_hash)
        .bind(client.client_type.as_str())
        .bind(client.is_active)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_from_tuple() {
        let client = client_from_tuple((
            "svc".to_string(),
            Some("$argon2id$...".to_string()),
            "confidential".to_string(),
            true,
        ))
        .unwrap();
        assert!(client.is_confidential());
        assert!(client.is_active);

        let client =
            client_from_tuple(("spa".to_string(), None, "public".to_string(), false)).unwrap();
        assert_eq!(client.client_type, ClientType::Public);
        assert!(!client.is_active);
    }

    #[test]
    fn test_client_from_tuple_rejects_unknown_type() {
        let err = client_from_tuple(("x".to_string(), None, "robot".to_string(), true)).unwrap_err();
        assert!(matches!(err, StorageError::InvalidData(_)));
    }
}
