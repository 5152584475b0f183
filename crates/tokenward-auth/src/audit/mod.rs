//! Audit events for token operations.
//!
//! A revocation attempt produces exactly one [`AuditEvent`]. Events never
//! say whether the token existed; they carry the hint the caller sent and a
//! short prefix of the token hash.
//!
//! Sink failures are logged and swallowed by the caller: whether an audit
//! row could be written must not change what the client sees.

use std::net::IpAddr;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Audited actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A client asked to revoke a token.
    TokenRevoke,
}

impl AuditAction {
    /// Returns the dotted action code stored with the event.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TokenRevoke => "token.revoke",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a request came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditSource {
    /// Client IP address, if known.
    pub ip_address: Option<IpAddr>,
    /// User agent string.
    pub user_agent: Option<String>,
}

/// One audited operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// Authenticated client.
    pub client_id: String,
    /// What happened.
    pub action: AuditAction,
    /// Resource kind acted upon.
    pub resource: String,
    /// Client IP address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpAddr>,
    /// User agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Whether the operation completed.
    pub success: bool,
    /// Free-form details.
    pub metadata: Value,
    /// When the event was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
}

/// Errors that can occur while recording an audit event.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// The sink could not persist the event.
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Destination for audit events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Records one event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event could not be persisted.
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Writes events to the `audit` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        tracing::info!(
            target: "audit",
            client_id = %event.client_id,
            action = %event.action,
            resource = %event.resource,
            ip = ?event.ip,
            user_agent = event.user_agent.as_deref().unwrap_or(""),
            success = event.success,
            metadata = %event.metadata,
            "audit event"
        );
        Ok(())
    }
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

#[async_trait]
impl AuditSink for NoopAuditSink {
    async fn record(&self, _event: &AuditEvent) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
    failing: bool,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every `record` call fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    /// Events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        if self.failing {
            return Err(AuditError::StorageError("audit sink unavailable".to_string()));
        }
        self.events
            .lock()
            .map_err(|_| AuditError::StorageError("audit sink lock poisoned".to_string()))?
            .push(event.clone());
        Ok(())
    }
}
