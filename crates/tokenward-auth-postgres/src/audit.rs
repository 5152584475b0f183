//! Audit sink writing to the `audit_log` table.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx_core::query::query;
use uuid::Uuid;

use tokenward_auth::audit::{AuditError, AuditEvent, AuditSink};

use crate::PgPool;

/// Persists audit events, one row per event.
#[derive(Debug, Clone)]
pub struct PostgresAuditSink {
    pool: Arc<PgPool>,
}

impl PostgresAuditSink {
    /// Creates a sink over the given pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PostgresAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        query(
            r#"
            INSERT INTO audit_log
                (id, client_id, action, resource, ip, user_agent, success, metadata, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&event.client_id)
        .bind(event.action.as_str())
        .bind(&event.resource)
        .bind(event.ip.map(|ip| ip.to_string()))
        .bind(event.user_agent.as_deref())
        .bind(event.success)
        .bind(&event.metadata)
        .bind(event.occurred_at)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| AuditError::StorageError(e.to_string()))?;

        Ok(())
    }
}
